//! # Configuration
//!
//! Settings are layered, later sources winning:
//!
//! 1. Built-in defaults (GCM, atomic writes, no keys)
//! 2. `.everglade.toml` in the working directory, or an explicit file
//! 3. `EVERGLADE_*` environment variables, e.g. `EVERGLADE_SCHEME=cbc`
//! 4. Command-line flags, applied by the binary
//!
//! ```toml
//! scheme = "oaep"
//! write_mode = "in-place"
//! rsa_key_file = "keys/backup.pem"
//! label = "backup-2024"
//! exclude = "data/keep-plain.txt"
//! ```

use crate::cipher::{CipherContext, Scheme, WriteMode};
use crate::error::{EvergladeError, Result};
use crate::key::KeyLoader;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = ".everglade.toml";
pub const ENV_PREFIX: &str = "EVERGLADE";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub scheme: Scheme,
    pub write_mode: WriteMode,
    pub key_file: Option<PathBuf>,
    pub rsa_key_file: Option<PathBuf>,
    pub associated_data: Option<String>,
    pub label: Option<String>,
    pub exclude: Option<PathBuf>,
    /// Config file the settings were read from, if any
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scheme: Scheme::Gcm,
            write_mode: WriteMode::Atomic,
            key_file: None,
            rsa_key_file: None,
            associated_data: None,
            label: None,
            exclude: None,
            config_file: None,
        }
    }
}

impl Settings {
    /// Load settings relative to the current directory
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_in(Path::new("."), config_path)
    }

    /// Load settings, looking for the default config file in `dir`.
    ///
    /// An explicit `config_path` must exist; the default file is optional.
    pub fn load_in(dir: &Path, config_path: Option<&Path>) -> Result<Self> {
        let (file, loaded) = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(EvergladeError::Config(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                let file = File::from(path).format(FileFormat::Toml).required(true);
                (file, Some(path.to_path_buf()))
            }
            None => {
                let path = dir.join(CONFIG_FILE);
                let loaded = path.is_file().then(|| path.clone());
                (File::from(path).format(FileFormat::Toml).required(false), loaded)
            }
        };

        let mut settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize::<Settings>()?;
        settings.config_file = loaded;

        Ok(settings)
    }

    /// GCM associated data and OAEP label as configured
    pub fn cipher_context(&self) -> CipherContext {
        CipherContext {
            associated_data: self
                .associated_data
                .as_deref()
                .map(|s| s.as_bytes().to_vec())
                .unwrap_or_default(),
            label: self
                .label
                .as_deref()
                .map(|s| s.as_bytes().to_vec())
                .unwrap_or_default(),
        }
    }

    /// Files a batch must never rewrite: the key files and the config file
    pub fn protected_paths(&self) -> impl Iterator<Item = &Path> {
        [&self.key_file, &self.rsa_key_file, &self.config_file]
            .into_iter()
            .filter_map(|path| path.as_deref())
    }

    pub fn key_loader(&self) -> KeyLoader {
        let mut loader = KeyLoader::new();
        if let Some(path) = &self.key_file {
            loader = loader.symmetric_key_file(path);
        }
        if let Some(path) = &self.rsa_key_file {
            loader = loader.rsa_key_file(path);
        }
        loader
    }
}
