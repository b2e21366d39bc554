use crate::cipher::Scheme;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of an [`EvergladeError`].
///
/// Lets callers tell "my data is corrupt or the key is wrong" apart from
/// "the disk is in trouble" without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Discovery,
    Read,
    Create,
    Write,
    Crypto,
    Key,
    Config,
    Io,
}

#[derive(Error, Debug)]
pub enum EvergladeError {
    #[error("Failed to walk directory at {}: {source}", .path.display())]
    FileWalk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create {}: {source}", .path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{scheme} encryption failed: {reason}")]
    Encrypt { scheme: Scheme, reason: String },

    #[error("{scheme} decryption failed: {reason}")]
    Decrypt { scheme: Scheme, reason: String },

    #[error("{} is too short to be a {scheme} record ({len} bytes)", .path.display())]
    TruncatedRecord {
        path: PathBuf,
        scheme: Scheme,
        len: usize,
    },

    #[error("No key loaded for {0}")]
    MissingKey(Scheme),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Key not found: {}", .0.display())]
    KeyNotFound(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvergladeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileWalk { .. } => ErrorKind::Discovery,
            Self::ReadFile { .. } => ErrorKind::Read,
            Self::CreateFile { .. } => ErrorKind::Create,
            Self::WriteFile { .. } => ErrorKind::Write,
            Self::Encrypt { .. }
            | Self::Decrypt { .. }
            | Self::TruncatedRecord { .. }
            | Self::MissingKey(_) => ErrorKind::Crypto,
            Self::InvalidKeyFormat(_) | Self::KeyNotFound(_) => ErrorKind::Key,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// True when the cipher primitive rejected the data or the key
    pub fn is_crypto(&self) -> bool {
        self.kind() == ErrorKind::Crypto
    }
}

impl From<::config::ConfigError> for EvergladeError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EvergladeError>;
