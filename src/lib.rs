//! # everglade
//!
//! Discover files in a directory tree and encrypt or decrypt them in place with
//! AES-256-CBC, AES-256-GCM or RSA-OAEP.
//!
//! ## Features
//!
//! - **Directory discovery**: Recursive walk that never lists the running
//!   executable and can leave out one more path
//! - **Three schemes**: AES-256-CBC, AES-256-GCM (authenticated) and RSA-OAEP
//! - **In-place rewrite**: The IV or nonce is stored in the same file, ahead of
//!   the ciphertext
//! - **Atomic replace**: Transformed content goes to a temporary file that is
//!   renamed over the original (opt out with [`WriteMode::InPlace`])
//! - **Pluggable keys**: The pipeline only sees the [`KeyMaterial`] trait
//!
//! ## Quick Start
//!
//! ```bash
//! # 32 raw bytes (or 64 hex characters) of key material, supplied by you
//! everglade list ./documents --extension txt
//! everglade encrypt ./documents --scheme gcm --key secret.key --ad "v1"
//! everglade decrypt ./documents --scheme gcm --key secret.key --ad "v1"
//!
//! # RSA-OAEP with a PEM key
//! everglade encrypt notes.txt --scheme oaep --rsa-key public.pem --label backup
//! everglade decrypt notes.txt --scheme oaep --rsa-key private.pem --label backup
//! ```
//!
//! As a library:
//!
//! ```no_run
//! use everglade::{discover_files_in_directory, CipherContext, FileCipher, KeyLoader, Scheme};
//!
//! fn main() -> everglade::Result<()> {
//!     let key = KeyLoader::new().symmetric_key_file("secret.key").load()?;
//!     let files = discover_files_in_directory("documents", None)?;
//!
//!     let context = CipherContext::new().with_associated_data("v1");
//!     FileCipher::new(&key).encrypt_all(&files, Scheme::Gcm, &context)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Encrypted File Format
//!
//! ```text
//! CBC:  [16-byte IV][ciphertext, PKCS#7 padded]
//! GCM:  [12-byte nonce][ciphertext + 16-byte tag]
//! OAEP: [ciphertext, RSA modulus size]
//! ```
//!
//! There is no header or scheme marker, so the same scheme, key, associated
//! data and label must be used to decrypt. Only GCM detects a mismatch; CBC
//! and OAEP may fail on padding or silently produce garbage.
//!
//! ## Module Overview
//!
//! - [`scanner`] - Directory discovery and file-name filters
//! - [`cipher`] - Per-file encrypt/decrypt and the on-disk record layout
//! - [`crypto`] - The [`KeyMaterial`] capability and its RustCrypto implementation
//! - [`key`] - Loading key files
//! - [`config`] - Layered settings (defaults, `.everglade.toml`, `EVERGLADE_*`)
//! - [`error`] - Error types and classification
//!
//! ## Safety Notes
//!
//! Every operation overwrites its target. There is no backup and no dry run.
//! With [`WriteMode::InPlace`] a crash between truncation and write leaves the
//! file empty or partial. Two processes working on the same file race and one
//! update is lost.
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib
//! cargo test --test integration_test
//! cargo test --test edge_cases_test
//! cargo test --test cli_test
//! ```

pub mod cipher;
pub mod config;
pub mod crypto;
pub mod error;
pub mod key;
pub mod scanner;

// Re-export commonly used types
pub use cipher::{CipherContext, FileCipher, Scheme, WriteMode};
pub use crate::config::Settings;
pub use crypto::{CryptoObject, KeyMaterial};
pub use error::{ErrorKind, EvergladeError, Result};
pub use key::KeyLoader;
pub use scanner::{
    discover_files_in_directory, find_file_in_directory, find_files_by_extension_in_directory,
    find_files_by_type_in_directory, FileEntry, FileList,
};
