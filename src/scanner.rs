use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A source file waiting to be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_name: String,
}

/// List the regular files directly inside `dir`, sorted by name.
///
/// A missing or unreadable directory is an error. Symlinks to files are
/// listed, subdirectories and dangling links are skipped.
pub fn list_files(dir: &Path) -> Result<Vec<SourceFile>> {
    if !dir.exists() {
        anyhow::bail!("Source directory does not exist: {}", dir.display());
    }
    if !dir.is_dir() {
        anyhow::bail!("Source path is not a directory: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;

        // `Path::is_file` follows symlinks, `entry.file_type()` does not
        if !entry.path().is_file() {
            log::debug!("Skipping non-file entry: {}", entry.path().display());
            continue;
        }

        files.push(SourceFile {
            file_name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.into_path(),
        });
    }

    log::debug!("Found {} files in {}", files.len(), dir.display());
    Ok(files)
}
