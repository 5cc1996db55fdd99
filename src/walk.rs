use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::AppError;

const HTML_SUFFIXES: [&str; 2] = [".html", ".htm"];

/// Lists every `.html`/`.htm` file under `root`, recursing into subdirectories.
///
/// Entries are visited sorted by file name, so the order is stable for a given
/// tree. Suffixes are matched case-sensitively. Symlinks that do not point at a
/// directory are listed too; a dangling one fails later when it is read. An
/// unreadable root fails the whole walk; unreadable entries below it are skipped.
pub fn find_html_files(root: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(AppError::Walk(err)),
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if is_file_like(&entry) && is_html_name(&entry.file_name().to_string_lossy()) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

fn is_file_like(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && !entry.path().is_dir())
}

fn is_html_name(name: &str) -> bool {
    HTML_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}
