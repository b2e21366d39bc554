use anyhow::{Context, Result};
use clap::Args;
use everglade::{
    discover_files_in_directory, find_file_in_directory, find_files_by_extension_in_directory,
    find_files_by_type_in_directory, FileEntry, FileList, Settings,
};
use std::path::PathBuf;

#[derive(Args)]
pub struct ListArgs {
    /// Directory to scan
    pub dir: PathBuf,

    /// Path to leave out of the listing
    #[arg(long, conflicts_with_all = ["name", "file_type", "extension"])]
    pub exclude: Option<PathBuf>,

    /// Print only the first file with exactly this name
    #[arg(long, conflicts_with_all = ["file_type", "extension"])]
    pub name: Option<String>,

    /// Print every file whose whole name equals this value
    #[arg(long = "type", conflicts_with = "extension")]
    pub file_type: Option<String>,

    /// Print every file with this extension
    #[arg(long)]
    pub extension: Option<String>,
}

/// Print discovered paths, one per line.
///
/// `--exclude`, or the configured `exclude`, is left out of every listing.
pub fn list(settings: &Settings, args: &ListArgs) -> Result<()> {
    let dir = &args.dir;
    let exclude = args.exclude.as_deref().or(settings.exclude.as_deref());
    let scan_context = || format!("Failed to scan {}", dir.display());

    if let Some(name) = &args.name {
        let found: FileList = find_file_in_directory(dir, name)
            .with_context(scan_context)?
            .map(FileEntry::new)
            .into_iter()
            .collect();
        match found.without(exclude).into_iter().next() {
            Some(file) => println!("{}", file.path().display()),
            None => eprintln!("No file named {name} under {}", dir.display()),
        }
        return Ok(());
    }

    let files = if let Some(file_type) = &args.file_type {
        find_files_by_type_in_directory(dir, file_type)
    } else if let Some(extension) = &args.extension {
        find_files_by_extension_in_directory(dir, extension)
    } else {
        discover_files_in_directory(dir, exclude)
    }
    .with_context(scan_context)?;

    for path in files.without(exclude).paths() {
        println!("{}", path.display());
    }

    Ok(())
}
