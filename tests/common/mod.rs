use assert_cmd::{cargo::cargo_bin_cmd, Command};
use everglade::CryptoObject;
use rand::RngCore;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

/// Files created by [`create_tree`], relative to its root, in walk order.
#[allow(dead_code)]
pub const TREE: &[(&str, &[u8])] = &[
    ("docs/a.txt", b"alpha document"),
    ("docs/nested/report.txt", b"quarterly numbers"),
    ("empty.dat", b""),
    ("photos/img.bin", &[0u8, 1, 2, 3, 255, 254, 253]),
    ("report.txt", b"top-level report"),
];

/// Create a temporary directory populated with [`TREE`].
#[allow(dead_code)]
pub fn create_tree() -> TempDir {
    let temp = TempDir::new().expect("failed to create temp dir");
    for (rel, contents) in TREE {
        let path = temp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
    }
    temp
}

#[allow(dead_code)]
pub fn symmetric_key_bytes() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

/// A 1024-bit key shared across the tests of one binary.
#[allow(dead_code)]
pub fn rsa_private_key() -> RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).expect("failed to generate rsa key")
    })
    .clone()
}

#[allow(dead_code)]
pub fn crypto_object() -> CryptoObject {
    CryptoObject::from_symmetric_key(&symmetric_key_bytes())
        .unwrap()
        .with_rsa_private_key(rsa_private_key())
}

/// Write a raw symmetric key file into `dir`.
#[allow(dead_code)]
pub fn write_symmetric_key(dir: &Path) -> PathBuf {
    let path = dir.join("aes.key");
    fs::write(&path, symmetric_key_bytes()).unwrap();
    path
}

/// Write the shared RSA key as PKCS#8 private and SPKI public PEM files into `dir`.
#[allow(dead_code)]
pub fn write_rsa_keys(dir: &Path) -> (PathBuf, PathBuf) {
    let private = rsa_private_key();
    let private_path = dir.join("rsa.pem");
    let public_path = dir.join("rsa.pub.pem");

    fs::write(
        &private_path,
        private.to_pkcs8_pem(LineEnding::LF).unwrap().as_bytes(),
    )
    .unwrap();
    fs::write(
        &public_path,
        private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap(),
    )
    .unwrap();

    (private_path, public_path)
}

/// Read every file of [`TREE`] back from `root`.
#[allow(dead_code)]
pub fn read_tree(root: &Path) -> Vec<Vec<u8>> {
    TREE.iter()
        .map(|(rel, _)| fs::read(root.join(rel)).unwrap())
        .collect()
}

#[allow(dead_code)]
pub fn original_tree() -> Vec<Vec<u8>> {
    TREE.iter().map(|(_, contents)| contents.to_vec()).collect()
}

/// Every environment variable `Settings` reads.
#[allow(dead_code)]
pub const SETTINGS_ENV: &[&str] = &[
    "EVERGLADE_SCHEME",
    "EVERGLADE_WRITE_MODE",
    "EVERGLADE_KEY_FILE",
    "EVERGLADE_RSA_KEY_FILE",
    "EVERGLADE_ASSOCIATED_DATA",
    "EVERGLADE_LABEL",
    "EVERGLADE_EXCLUDE",
];

/// Convenience helper for spawning the everglade binary via assert_cmd.
#[allow(dead_code)]
pub fn everglade_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("everglade");
    for var in SETTINGS_ENV {
        cmd.env_remove(var);
    }
    cmd
}
