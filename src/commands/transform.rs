use anyhow::{bail, Context, Result};
use clap::Args;
use everglade::{
    discover_files_in_directory, find_file_in_directory, find_files_by_extension_in_directory,
    CryptoObject, FileCipher, FileEntry, FileList, Scheme, Settings, WriteMode,
};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct TransformArgs {
    /// File or directory to transform
    pub target: PathBuf,

    /// Cipher scheme [default: gcm, or the configured scheme]
    #[arg(short, long, value_enum)]
    pub scheme: Option<Scheme>,

    /// Symmetric key file (32 raw bytes or 64 hex characters), for cbc and gcm
    #[arg(short, long)]
    pub key: Option<PathBuf>,

    /// RSA key file in PEM format, for oaep
    #[arg(long)]
    pub rsa_key: Option<PathBuf>,

    /// GCM associated data
    #[arg(long)]
    pub ad: Option<String>,

    /// OAEP label
    #[arg(long)]
    pub label: Option<String>,

    /// Path to leave untouched when TARGET is a directory
    #[arg(long, conflicts_with_all = ["name", "extension"])]
    pub exclude: Option<PathBuf>,

    /// Only the first file with exactly this name under TARGET
    #[arg(long, conflicts_with = "extension")]
    pub name: Option<String>,

    /// Only files with this extension under TARGET
    #[arg(long)]
    pub extension: Option<String>,

    /// Truncate and rewrite files directly instead of replacing them atomically
    #[arg(long)]
    pub in_place: bool,
}

impl TransformArgs {
    /// Command-line flags take precedence over configured settings
    fn merge(&self, settings: &Settings) -> Settings {
        let mut merged = settings.clone();
        if let Some(scheme) = self.scheme {
            merged.scheme = scheme;
        }
        if self.in_place {
            merged.write_mode = WriteMode::InPlace;
        }
        if let Some(key) = &self.key {
            merged.key_file = Some(key.clone());
        }
        if let Some(rsa_key) = &self.rsa_key {
            merged.rsa_key_file = Some(rsa_key.clone());
        }
        if let Some(ad) = &self.ad {
            merged.associated_data = Some(ad.clone());
        }
        if let Some(label) = &self.label {
            merged.label = Some(label.clone());
        }
        if let Some(exclude) = &self.exclude {
            merged.exclude = Some(exclude.clone());
        }
        merged
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    fn verb(self) -> &'static str {
        match self {
            Direction::Encrypt => "Encrypt",
            Direction::Decrypt => "Decrypt",
        }
    }
}

/// Encrypt the target file or every selected file under the target directory
pub fn encrypt(settings: &Settings, args: &TransformArgs) -> Result<()> {
    transform(Direction::Encrypt, settings, args)
}

/// Decrypt the target file or every selected file under the target directory
pub fn decrypt(settings: &Settings, args: &TransformArgs) -> Result<()> {
    transform(Direction::Decrypt, settings, args)
}

fn transform(direction: Direction, settings: &Settings, args: &TransformArgs) -> Result<()> {
    let settings = args.merge(settings);
    let scheme = settings.scheme;

    let key = load_key(&settings)?;
    let files = select_files(&args.target, &settings, args)?;

    if files.is_empty() {
        println!("No files to {}.", direction.verb().to_lowercase());
        return Ok(());
    }

    println!(
        "{}ing {} file(s) with {scheme}...",
        direction.verb(),
        files.len()
    );

    let cipher = FileCipher::new(&key).with_write_mode(settings.write_mode);
    let context = settings.cipher_context();

    for file in &files {
        match direction {
            Direction::Encrypt => cipher.encrypt(file, scheme, &context),
            Direction::Decrypt => cipher.decrypt(file, scheme, &context),
        }
        .with_context(|| {
            format!(
                "Failed to {} {}",
                direction.verb().to_lowercase(),
                file.path().display()
            )
        })?;
        println!("  {}", file.path().display());
    }

    println!("Done.");
    Ok(())
}

fn load_key(settings: &Settings) -> Result<CryptoObject> {
    let loader = settings.key_loader();

    match settings.scheme {
        Scheme::Cbc | Scheme::Gcm if !loader.has_symmetric_key_file() => {
            bail!("{} needs a symmetric key file (--key)", settings.scheme)
        }
        Scheme::Oaep if !loader.has_rsa_key_file() => {
            bail!("{} needs an RSA key file (--rsa-key)", settings.scheme)
        }
        _ => {}
    }

    loader.load().context("Failed to load key material")
}

/// Files the command will rewrite.
///
/// The configured exclusion applies to every selection, and the key and
/// config files in use are always left out.
fn select_files(target: &Path, settings: &Settings, args: &TransformArgs) -> Result<FileList> {
    let files: FileList = if !target.is_dir() {
        [FileEntry::new(target)].into_iter().collect()
    } else {
        let scan_context = || format!("Failed to scan {}", target.display());

        if let Some(name) = &args.name {
            find_file_in_directory(target, name)
                .with_context(scan_context)?
                .map(FileEntry::new)
                .into_iter()
                .collect()
        } else if let Some(extension) = &args.extension {
            find_files_by_extension_in_directory(target, extension).with_context(scan_context)?
        } else {
            discover_files_in_directory(target, settings.exclude.as_deref())
                .with_context(scan_context)?
        }
    };

    Ok(files.without(
        settings
            .exclude
            .as_deref()
            .into_iter()
            .chain(settings.protected_paths()),
    ))
}
