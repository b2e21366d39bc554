//! # Key Material
//!
//! The file transformation pipeline never touches key bytes directly. It talks
//! to a [`KeyMaterial`] capability that exposes three encrypt/decrypt pairs,
//! one per scheme, and leaves the cipher math to the RustCrypto crates.
//!
//! ## Schemes
//!
//! | Scheme | Primitive | Metadata | Notes |
//! |--------|-----------|----------|-------|
//! | CBC  | AES-256-CBC, PKCS#7 padding | 16-byte IV | no integrity check |
//! | GCM  | AES-256-GCM | 12-byte nonce | 16-byte tag appended to the ciphertext |
//! | OAEP | RSA-OAEP with SHA-256 | none | ciphertext length equals the modulus size |
//!
//! IVs and nonces are drawn from the OS random number generator for every
//! call, so encrypting the same plaintext twice never yields the same record.
//!
//! ## Unit Tests
//!
//! ```bash
//! cargo test crypto::
//! ```

use crate::cipher::Scheme;
use crate::error::{EvergladeError, Result};
use aes::Aes256;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rsa::{traits::PublicKeyParts, Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::fmt;

pub const KEY_SIZE: usize = 32; // 256 bits
pub const IV_SIZE: usize = 16; // AES block size
pub const NONCE_SIZE: usize = 12; // 96 bits for GCM
pub const TAG_SIZE: usize = 16;

// SHA-256 output length, used twice by the OAEP encoding
const OAEP_HASH_SIZE: usize = 32;

/// Capability the file cipher consumes.
///
/// Implementations must report every rejection (bad padding, bad tag,
/// oversized plaintext, missing key) as an error instead of handing back
/// corrupt output.
pub trait KeyMaterial {
    /// Returns `(iv, ciphertext)`.
    fn encrypt_cbc(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)>;

    fn decrypt_cbc(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Returns `(nonce, ciphertext)`; the ciphertext carries the tag.
    fn encrypt_gcm(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<(Vec<u8>, Vec<u8>)>;

    fn decrypt_gcm(
        &self,
        nonce: &[u8],
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>>;

    fn encrypt_oaep(&self, plaintext: &[u8], label: &[u8]) -> Result<Vec<u8>>;

    fn decrypt_oaep(&self, ciphertext: &[u8], label: &[u8]) -> Result<Vec<u8>>;
}

/// Key material backed by AES-256 and RSA keys held in memory.
///
/// The symmetric key serves both CBC and GCM. An object built from a public
/// RSA key alone can encrypt with OAEP but not decrypt.
#[derive(Clone, Default)]
pub struct CryptoObject {
    symmetric: Option<[u8; KEY_SIZE]>,
    rsa_private: Option<RsaPrivateKey>,
    rsa_public: Option<RsaPublicKey>,
}

impl CryptoObject {
    /// Create an empty object; every operation fails until a key is added
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object from a raw 32-byte AES key
    pub fn from_symmetric_key(bytes: &[u8]) -> Result<Self> {
        Self::new().with_symmetric_key(bytes)
    }

    pub fn with_symmetric_key(mut self, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(EvergladeError::InvalidKeyFormat(format!(
                "symmetric key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        self.symmetric = Some(key);
        Ok(self)
    }

    pub fn with_rsa_private_key(mut self, key: RsaPrivateKey) -> Self {
        self.rsa_public = Some(key.to_public_key());
        self.rsa_private = Some(key);
        self
    }

    pub fn with_rsa_public_key(mut self, key: RsaPublicKey) -> Self {
        self.rsa_public = Some(key);
        self
    }

    pub fn has_symmetric_key(&self) -> bool {
        self.symmetric.is_some()
    }

    pub fn has_rsa_private_key(&self) -> bool {
        self.rsa_private.is_some()
    }

    /// Size in bytes of the RSA modulus, which is also the OAEP record size
    pub fn rsa_modulus_len(&self) -> Option<usize> {
        self.rsa_public.as_ref().map(|key| key.size())
    }

    /// Longest plaintext OAEP can seal with the loaded public key
    pub fn max_oaep_message_len(&self) -> Option<usize> {
        self.rsa_modulus_len()
            .map(|k| k.saturating_sub(2 * OAEP_HASH_SIZE + 2))
    }

    fn symmetric_key(&self, scheme: Scheme) -> Result<&[u8; KEY_SIZE]> {
        self.symmetric
            .as_ref()
            .ok_or(EvergladeError::MissingKey(scheme))
    }
}

impl fmt::Debug for CryptoObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoObject")
            .field("symmetric", &self.symmetric.map(|_| "<redacted>"))
            .field("rsa_private", &self.rsa_private.as_ref().map(|_| "<redacted>"))
            .field("rsa_modulus_len", &self.rsa_modulus_len())
            .finish()
    }
}

fn oaep_padding(label: &[u8], scheme_error: impl Fn(String) -> EvergladeError) -> Result<Oaep> {
    // rsa keeps the label as a String
    let label = std::str::from_utf8(label)
        .map_err(|_| scheme_error("OAEP label must be valid UTF-8".into()))?;
    Ok(Oaep::new_with_label::<Sha256, _>(label))
}

fn encrypt_error(scheme: Scheme) -> impl Fn(String) -> EvergladeError {
    move |reason| EvergladeError::Encrypt { scheme, reason }
}

fn decrypt_error(scheme: Scheme) -> impl Fn(String) -> EvergladeError {
    move |reason| EvergladeError::Decrypt { scheme, reason }
}

impl KeyMaterial for CryptoObject {
    fn encrypt_cbc(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let key = self.symmetric_key(Scheme::Cbc)?;

        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = cbc::Encryptor::<Aes256>::new(key.into(), (&iv).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        Ok((iv.to_vec(), ciphertext))
    }

    fn decrypt_cbc(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let key = self.symmetric_key(Scheme::Cbc)?;
        let fail = decrypt_error(Scheme::Cbc);

        let decryptor = cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(|_| fail(format!("IV must be {IV_SIZE} bytes, got {}", iv.len())))?;

        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| fail("invalid padding or ciphertext length".into()))
    }

    fn encrypt_gcm(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let key = self.symmetric_key(Scheme::Gcm)?;
        let fail = encrypt_error(Scheme::Gcm);

        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| fail(e.to_string()))?;

        // Generate random nonce
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|e| fail(e.to_string()))?;

        Ok((nonce_bytes.to_vec(), ciphertext))
    }

    fn decrypt_gcm(
        &self,
        nonce: &[u8],
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let key = self.symmetric_key(Scheme::Gcm)?;
        let fail = decrypt_error(Scheme::Gcm);

        if nonce.len() != NONCE_SIZE {
            return Err(fail(format!(
                "nonce must be {NONCE_SIZE} bytes, got {}",
                nonce.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| fail(e.to_string()))?;

        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: associated_data,
                },
            )
            .map_err(|_| fail("authentication failed".into()))
    }

    fn encrypt_oaep(&self, plaintext: &[u8], label: &[u8]) -> Result<Vec<u8>> {
        let key = self
            .rsa_public
            .as_ref()
            .ok_or(EvergladeError::MissingKey(Scheme::Oaep))?;
        let fail = encrypt_error(Scheme::Oaep);

        let padding = oaep_padding(label, &fail)?;
        key.encrypt(&mut OsRng, padding, plaintext).map_err(|e| fail(e.to_string()))
    }

    fn decrypt_oaep(&self, ciphertext: &[u8], label: &[u8]) -> Result<Vec<u8>> {
        let key = self
            .rsa_private
            .as_ref()
            .ok_or(EvergladeError::MissingKey(Scheme::Oaep))?;
        let fail = decrypt_error(Scheme::Oaep);

        let padding = oaep_padding(label, &fail)?;
        key.decrypt(padding, ciphertext).map_err(|e| fail(e.to_string()))
    }
}
