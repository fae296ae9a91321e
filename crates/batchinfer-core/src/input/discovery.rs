//! Listing the items of an image folder.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::SetupError;

/// List every regular file directly inside `folder`, sorted by path.
///
/// The listing is not recursive and applies no extension filter: files that
/// turn out not to be images are skipped later, when decoding fails.
pub fn list_folder(folder: &Path) -> Result<Vec<PathBuf>, SetupError> {
    if !folder.is_dir() {
        return Err(SetupError::ImageFolderMissing(folder.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    files.sort();
    Ok(files)
}

/// The file name used as an output record key.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
