//! # File Cipher
//!
//! Encrypts and decrypts single files in place through a [`KeyMaterial`].
//!
//! ## Record Layout
//!
//! ```text
//! CBC:  [16-byte IV][ciphertext, PKCS#7 padded to the block size]
//! GCM:  [12-byte nonce][ciphertext + 16-byte tag]
//! OAEP: [ciphertext, exactly the RSA modulus size]
//! ```
//!
//! Records carry no scheme marker. Decrypting with the wrong scheme either
//! fails inside the primitive or produces garbage; only GCM can tell.
//!
//! ## Write Modes
//!
//! Every operation reads the whole file, transforms it in memory and
//! replaces the file. Nothing is written until the cipher has succeeded, so a
//! crypto error never touches the file.
//!
//! - [`WriteMode::Atomic`] (default) writes a sibling temporary file and
//!   renames it over the target. A crash leaves either the old or the new
//!   content.
//! - [`WriteMode::InPlace`] truncates the target and writes into it. A crash
//!   between the two leaves an empty or partial file, and there is no
//!   recovery. Two processes working on the same path lose one update in
//!   either mode.

use crate::crypto::{KeyMaterial, IV_SIZE, NONCE_SIZE};
use crate::error::{EvergladeError, Result};
use crate::scanner::{FileEntry, FileList};
use serde::Deserialize;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Cipher scheme used for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Cbc,
    Gcm,
    Oaep,
}

impl Scheme {
    /// Bytes of IV or nonce stored ahead of the ciphertext
    pub const fn prefix_len(self) -> usize {
        match self {
            Scheme::Cbc => IV_SIZE,
            Scheme::Gcm => NONCE_SIZE,
            Scheme::Oaep => 0,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scheme::Cbc => "AES-256-CBC",
            Scheme::Gcm => "AES-256-GCM",
            Scheme::Oaep => "RSA-OAEP",
        })
    }
}

/// How a transformed file replaces the original
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    #[default]
    Atomic,
    InPlace,
}

/// Per-call inputs that are not part of the key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CipherContext {
    /// Authenticated but unencrypted GCM input
    pub associated_data: Vec<u8>,
    /// OAEP label
    pub label: Vec<u8>,
}

impl CipherContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_associated_data(mut self, ad: impl Into<Vec<u8>>) -> Self {
        self.associated_data = ad.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<Vec<u8>>) -> Self {
        self.label = label.into();
        self
    }
}

/// Transforms files with one key and one write mode
pub struct FileCipher<'k, K: KeyMaterial + ?Sized> {
    key: &'k K,
    write_mode: WriteMode,
}

impl<'k, K: KeyMaterial + ?Sized> FileCipher<'k, K> {
    pub fn new(key: &'k K) -> Self {
        Self {
            key,
            write_mode: WriteMode::default(),
        }
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    pub fn encrypt_cbc(&self, file: &FileEntry) -> Result<()> {
        let plaintext = read_file(file.path())?;
        let (iv, ciphertext) = self.key.encrypt_cbc(&plaintext)?;
        let record = pack_record(Scheme::Cbc, &iv, ciphertext)?;
        self.replace(file, Scheme::Cbc, &record)
    }

    pub fn decrypt_cbc(&self, file: &FileEntry) -> Result<()> {
        let record = read_file(file.path())?;
        let (iv, ciphertext) = split_record(file.path(), Scheme::Cbc, &record)?;
        let plaintext = self.key.decrypt_cbc(iv, ciphertext)?;
        self.replace(file, Scheme::Cbc, &plaintext)
    }

    pub fn encrypt_gcm(&self, file: &FileEntry, associated_data: &[u8]) -> Result<()> {
        let plaintext = read_file(file.path())?;
        let (nonce, ciphertext) = self.key.encrypt_gcm(&plaintext, associated_data)?;
        let record = pack_record(Scheme::Gcm, &nonce, ciphertext)?;
        self.replace(file, Scheme::Gcm, &record)
    }

    pub fn decrypt_gcm(&self, file: &FileEntry, associated_data: &[u8]) -> Result<()> {
        let record = read_file(file.path())?;
        let (nonce, ciphertext) = split_record(file.path(), Scheme::Gcm, &record)?;
        let plaintext = self.key.decrypt_gcm(nonce, ciphertext, associated_data)?;
        self.replace(file, Scheme::Gcm, &plaintext)
    }

    pub fn encrypt_oaep(&self, file: &FileEntry, label: &[u8]) -> Result<()> {
        let plaintext = read_file(file.path())?;
        let ciphertext = self.key.encrypt_oaep(&plaintext, label)?;
        self.replace(file, Scheme::Oaep, &ciphertext)
    }

    pub fn decrypt_oaep(&self, file: &FileEntry, label: &[u8]) -> Result<()> {
        let ciphertext = read_file(file.path())?;
        let plaintext = self.key.decrypt_oaep(&ciphertext, label)?;
        self.replace(file, Scheme::Oaep, &plaintext)
    }

    /// Encrypt one file with the given scheme
    pub fn encrypt(
        &self,
        file: &FileEntry,
        scheme: Scheme,
        context: &CipherContext,
    ) -> Result<()> {
        match scheme {
            Scheme::Cbc => self.encrypt_cbc(file),
            Scheme::Gcm => self.encrypt_gcm(file, &context.associated_data),
            Scheme::Oaep => self.encrypt_oaep(file, &context.label),
        }
    }

    /// Decrypt one file with the given scheme
    pub fn decrypt(
        &self,
        file: &FileEntry,
        scheme: Scheme,
        context: &CipherContext,
    ) -> Result<()> {
        match scheme {
            Scheme::Cbc => self.decrypt_cbc(file),
            Scheme::Gcm => self.decrypt_gcm(file, &context.associated_data),
            Scheme::Oaep => self.decrypt_oaep(file, &context.label),
        }
    }

    /// Encrypt every file in order, stopping at the first failure.
    ///
    /// Files before the failing one stay encrypted.
    pub fn encrypt_all(
        &self,
        files: &FileList,
        scheme: Scheme,
        context: &CipherContext,
    ) -> Result<usize> {
        for file in files {
            self.encrypt(file, scheme, context)?;
        }
        info!("Encrypted {} file(s) with {scheme}", files.len());
        Ok(files.len())
    }

    /// Decrypt every file in order, stopping at the first failure
    pub fn decrypt_all(
        &self,
        files: &FileList,
        scheme: Scheme,
        context: &CipherContext,
    ) -> Result<usize> {
        for file in files {
            self.decrypt(file, scheme, context)?;
        }
        info!("Decrypted {} file(s) with {scheme}", files.len());
        Ok(files.len())
    }

    fn replace(&self, file: &FileEntry, scheme: Scheme, contents: &[u8]) -> Result<()> {
        match self.write_mode {
            WriteMode::InPlace => write_in_place(file.path(), contents)?,
            WriteMode::Atomic => write_atomic(file.path(), contents)?,
        }
        debug!(
            "Rewrote {} ({scheme}, {} bytes, {:?})",
            file.path().display(),
            contents.len(),
            self.write_mode
        );
        Ok(())
    }
}

impl FileEntry {
    pub fn encrypt_cbc<K: KeyMaterial + ?Sized>(&self, key: &K) -> Result<()> {
        FileCipher::new(key).encrypt_cbc(self)
    }

    pub fn decrypt_cbc<K: KeyMaterial + ?Sized>(&self, key: &K) -> Result<()> {
        FileCipher::new(key).decrypt_cbc(self)
    }

    pub fn encrypt_gcm<K: KeyMaterial + ?Sized>(
        &self,
        key: &K,
        associated_data: &[u8],
    ) -> Result<()> {
        FileCipher::new(key).encrypt_gcm(self, associated_data)
    }

    pub fn decrypt_gcm<K: KeyMaterial + ?Sized>(
        &self,
        key: &K,
        associated_data: &[u8],
    ) -> Result<()> {
        FileCipher::new(key).decrypt_gcm(self, associated_data)
    }

    pub fn encrypt_oaep<K: KeyMaterial + ?Sized>(&self, key: &K, label: &[u8]) -> Result<()> {
        FileCipher::new(key).encrypt_oaep(self, label)
    }

    pub fn decrypt_oaep<K: KeyMaterial + ?Sized>(&self, key: &K, label: &[u8]) -> Result<()> {
        FileCipher::new(key).decrypt_oaep(self, label)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| EvergladeError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn pack_record(scheme: Scheme, prefix: &[u8], ciphertext: Vec<u8>) -> Result<Vec<u8>> {
    if prefix.len() != scheme.prefix_len() {
        return Err(EvergladeError::Encrypt {
            scheme,
            reason: format!(
                "key material returned a {}-byte prefix, expected {}",
                prefix.len(),
                scheme.prefix_len()
            ),
        });
    }

    let mut record = Vec::with_capacity(prefix.len() + ciphertext.len());
    record.extend_from_slice(prefix);
    record.extend_from_slice(&ciphertext);
    Ok(record)
}

fn split_record<'a>(
    path: &Path,
    scheme: Scheme,
    record: &'a [u8],
) -> Result<(&'a [u8], &'a [u8])> {
    if record.len() < scheme.prefix_len() {
        return Err(EvergladeError::TruncatedRecord {
            path: path.to_path_buf(),
            scheme,
            len: record.len(),
        });
    }
    Ok(record.split_at(scheme.prefix_len()))
}

fn write_in_place(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|source| EvergladeError::CreateFile {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(contents).map_err(|source| EvergladeError::WriteFile {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    // Replace the file a symlink points at, not the link itself
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let create_error = |source: std::io::Error| EvergladeError::CreateFile {
        path: target.clone(),
        source,
    };
    let write_error = |source: std::io::Error| EvergladeError::WriteFile {
        path: target.clone(),
        source,
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".everglade-")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(create_error)?;

    if let Ok(metadata) = fs::metadata(&target) {
        fs::set_permissions(temp.path(), metadata.permissions()).map_err(create_error)?;
    }

    temp.write_all(contents).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(&target).map_err(|err| write_error(err.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_keys::full_object;
    use crate::crypto::{CryptoObject, TAG_SIZE};
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn write_entry(temp: &TempDir, name: &str, contents: &[u8]) -> FileEntry {
        let path = temp.path().join(name);
        fs::write(&path, contents).unwrap();
        FileEntry::new(path)
    }

    /// Key material that hands back a fixed prefix, for layout checks
    struct FixedPrefix(Vec<u8>);

    impl KeyMaterial for FixedPrefix {
        fn encrypt_cbc(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
            Ok((self.0.clone(), plaintext.to_vec()))
        }
        fn decrypt_cbc(&self, _iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
        fn encrypt_gcm(&self, plaintext: &[u8], _ad: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
            Ok((self.0.clone(), plaintext.to_vec()))
        }
        fn decrypt_gcm(&self, _nonce: &[u8], ciphertext: &[u8], _ad: &[u8]) -> Result<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
        fn encrypt_oaep(&self, plaintext: &[u8], _label: &[u8]) -> Result<Vec<u8>> {
            Ok(plaintext.to_vec())
        }
        fn decrypt_oaep(&self, ciphertext: &[u8], _label: &[u8]) -> Result<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
    }

    #[test]
    fn test_scheme_prefix_lengths() {
        assert_eq!(Scheme::Cbc.prefix_len(), 16);
        assert_eq!(Scheme::Gcm.prefix_len(), 12);
        assert_eq!(Scheme::Oaep.prefix_len(), 0);
    }

    #[test]
    fn test_cbc_layout_and_roundtrip() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let plaintext = b"twenty bytes of text";
        let file = write_entry(&temp, "cbc.txt", plaintext);

        file.encrypt_cbc(&key).unwrap();
        let record = fs::read(file.path()).unwrap();
        assert_eq!(record.len(), IV_SIZE + 32);

        file.decrypt_cbc(&key).unwrap();
        assert_eq!(fs::read(file.path()).unwrap(), plaintext);
    }

    #[test]
    fn test_gcm_layout_and_roundtrip() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let plaintext = b"authenticated";
        let file = write_entry(&temp, "gcm.txt", plaintext);

        file.encrypt_gcm(&key, b"ad").unwrap();
        let record = fs::read(file.path()).unwrap();
        assert_eq!(record.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);

        file.decrypt_gcm(&key, b"ad").unwrap();
        assert_eq!(fs::read(file.path()).unwrap(), plaintext);
    }

    #[test]
    fn test_oaep_layout_and_roundtrip() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let plaintext = b"tiny";
        let file = write_entry(&temp, "oaep.txt", plaintext);

        file.encrypt_oaep(&key, b"label").unwrap();
        let record = fs::read(file.path()).unwrap();
        assert_eq!(Some(record.len()), key.rsa_modulus_len());

        file.decrypt_oaep(&key, b"label").unwrap();
        assert_eq!(fs::read(file.path()).unwrap(), plaintext);
    }

    #[test]
    fn test_prefix_is_written_ahead_of_ciphertext() {
        let temp = TempDir::new().unwrap();
        let key = FixedPrefix(vec![0xAA; NONCE_SIZE]);
        let file = write_entry(&temp, "layout.bin", b"body");

        file.encrypt_gcm(&key, b"").unwrap();

        let mut expected = vec![0xAA; NONCE_SIZE];
        expected.extend_from_slice(b"body");
        assert_eq!(fs::read(file.path()).unwrap(), expected);

        file.decrypt_gcm(&key, b"").unwrap();
        assert_eq!(fs::read(file.path()).unwrap(), b"body");
    }

    #[test]
    fn test_wrong_prefix_length_is_rejected_before_writing() {
        let temp = TempDir::new().unwrap();
        let key = FixedPrefix(vec![0u8; 8]);
        let file = write_entry(&temp, "short-iv.bin", b"original");

        let err = file.encrypt_cbc(&key).unwrap_err();
        assert!(err.is_crypto());
        assert_eq!(fs::read(file.path()).unwrap(), b"original");
    }

    #[test]
    fn test_truncated_record() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let file = write_entry(&temp, "short.bin", b"0123456789");

        let err = file.decrypt_cbc(&key).unwrap_err();
        assert!(matches!(
            err,
            EvergladeError::TruncatedRecord {
                scheme: Scheme::Cbc,
                len: 10,
                ..
            }
        ));
        assert_eq!(fs::read(file.path()).unwrap(), b"0123456789");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let file = FileEntry::new(temp.path().join("absent.txt"));

        for scheme in [Scheme::Cbc, Scheme::Gcm, Scheme::Oaep] {
            let cipher = FileCipher::new(&key);
            let err = cipher
                .encrypt(&file, scheme, &CipherContext::default())
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Read);
        }
    }

    #[test]
    fn test_gcm_tamper_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let file = write_entry(&temp, "tamper.txt", b"do not touch");

        file.encrypt_gcm(&key, b"").unwrap();
        let mut record = fs::read(file.path()).unwrap();
        let last = record.len() - 1;
        record[last] ^= 0x01;
        fs::write(file.path(), &record).unwrap();

        let err = file.decrypt_gcm(&key, b"").unwrap_err();
        assert!(err.is_crypto());
        assert_eq!(fs::read(file.path()).unwrap(), record);
    }

    #[test]
    fn test_in_place_mode_roundtrip() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let file = write_entry(&temp, "inplace.txt", b"in place");
        let cipher = FileCipher::new(&key).with_write_mode(WriteMode::InPlace);
        let context = CipherContext::new().with_associated_data("x");

        cipher.encrypt(&file, Scheme::Gcm, &context).unwrap();
        assert_ne!(fs::read(file.path()).unwrap(), b"in place");

        cipher.decrypt(&file, Scheme::Gcm, &context).unwrap();
        assert_eq!(fs::read(file.path()).unwrap(), b"in place");
    }

    #[test]
    fn test_atomic_mode_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let file = write_entry(&temp, "only.txt", b"alone");

        FileCipher::new(&key).encrypt_cbc(&file).unwrap();

        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("only.txt")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_mode_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let key = full_object();
        let file = write_entry(&temp, "perm.txt", b"mode");
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o640)).unwrap();

        FileCipher::new(&key).encrypt_gcm(&file, b"").unwrap();

        let mode = fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_mode_writes_through_symlink() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let real = write_entry(&temp, "real.txt", b"linked");
        let link = temp.path().join("link.txt");
        std::os::unix::fs::symlink(real.path(), &link).unwrap();

        FileEntry::new(&link).encrypt_gcm(&key, b"").unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        real.decrypt_gcm(&key, b"").unwrap();
        assert_eq!(fs::read(real.path()).unwrap(), b"linked");
    }

    #[test]
    fn test_encrypt_all_and_decrypt_all() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let files: FileList = ["one", "two", "three"]
            .into_iter()
            .map(|name| write_entry(&temp, name, name.as_bytes()))
            .collect();
        let cipher = FileCipher::new(&key);
        let context = CipherContext::default();

        assert_eq!(cipher.encrypt_all(&files, Scheme::Cbc, &context).unwrap(), 3);
        for file in &files {
            let name = file.file_name().unwrap().as_encoded_bytes();
            assert_ne!(fs::read(file.path()).unwrap(), name);
        }

        assert_eq!(cipher.decrypt_all(&files, Scheme::Cbc, &context).unwrap(), 3);
        for file in &files {
            let name = file.file_name().unwrap().as_encoded_bytes();
            assert_eq!(fs::read(file.path()).unwrap(), name);
        }
    }

    #[test]
    fn test_encrypt_all_stops_at_first_failure() {
        let temp = TempDir::new().unwrap();
        let key = CryptoObject::from_symmetric_key(&[7u8; 32]).unwrap();
        let first = write_entry(&temp, "first", b"1");
        let missing = FileEntry::new(temp.path().join("missing"));
        let last = write_entry(&temp, "last", b"3");
        let files: FileList = [first.clone(), missing, last.clone()].into_iter().collect();

        let err = FileCipher::new(&key)
            .encrypt_all(&files, Scheme::Gcm, &CipherContext::default())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Read);
        assert_ne!(fs::read(first.path()).unwrap(), b"1");
        assert_eq!(fs::read(last.path()).unwrap(), b"3");
    }

    #[cfg(unix)]
    fn set_mode(path: &Path, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_read_only_target_in_place_is_create_error() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let file = write_entry(&temp, "locked.txt", b"locked");
        set_mode(file.path(), 0o444);

        // Permission bits do not bind root
        if fs::OpenOptions::new().write(true).open(file.path()).is_ok() {
            return;
        }

        let err = FileCipher::new(&key)
            .with_write_mode(WriteMode::InPlace)
            .encrypt_gcm(&file, b"")
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Create);
        assert!(matches!(err, EvergladeError::CreateFile { .. }));
        assert_eq!(fs::read(file.path()).unwrap(), b"locked");
    }

    #[test]
    #[cfg(unix)]
    fn test_read_only_directory_atomic_is_create_error() {
        let temp = TempDir::new().unwrap();
        let key = full_object();
        let dir = temp.path().join("sealed");
        fs::create_dir(&dir).unwrap();
        let file = FileEntry::new(dir.join("inner.txt"));
        fs::write(file.path(), b"inner").unwrap();
        set_mode(&dir, 0o555);

        let writable = dir.join(".write-check");
        if fs::File::create(&writable).is_ok() {
            fs::remove_file(&writable).unwrap();
            set_mode(&dir, 0o755);
            return;
        }

        let result = FileCipher::new(&key).encrypt_cbc(&file);
        set_mode(&dir, 0o755);

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Create);
        assert_eq!(fs::read(file.path()).unwrap(), b"inner");
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
    }
}
