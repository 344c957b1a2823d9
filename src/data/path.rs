// ============================================================
// Layer 4: Path Resolution and Image Listing
// ============================================================
// Two small helpers every folder layout goes through:
//
//   validate_and_resolve_path → join onto root, require existence
//   prepare_files_labels      → recursive listing of image files
//
// Hidden files and anything under a hidden directory are skipped,
// so editor droppings like `.DS_Store` never become samples.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::error::{DataError, DataResult};
use crate::domain::labels::DirType;

/// Extensions accepted when the caller does not pass their own.
pub const IMG_EXTENSIONS: &[&str] = &[
    ".bmp", ".dng", ".jpeg", ".jpg", ".mpo", ".png", ".tif", ".tiff", ".webp",
];

/// Resolve `path` against an optional `root` and make sure it exists.
///
/// Relative paths are joined onto `root`; absolute paths are used as-is.
/// The returned path is canonical.
pub fn validate_and_resolve_path(path: &Path, root: Option<&Path>) -> DataResult<PathBuf> {
    let joined = match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    };

    if !joined.exists() {
        return Err(DataError::MissingPath { path: joined });
    }

    joined.canonicalize().map_err(|source| DataError::Io { path: joined, source })
}

/// Recursively list every file under `dir` whose extension is in
/// `extensions` (case-insensitive, with or without the leading dot).
///
/// Returns the sorted file list together with one `dir_type` label
/// per file. Zero matches is an error.
pub fn prepare_files_labels(
    dir:        &Path,
    dir_type:   DirType,
    extensions: Option<&[String]>,
) -> DataResult<(Vec<PathBuf>, Vec<DirType>)> {
    let allowed: Vec<String> = match extensions {
        Some(exts) => exts.iter().map(|e| normalise_extension(e)).collect(),
        None => IMG_EXTENSIONS.iter().map(|e| normalise_extension(e)).collect(),
    };

    let mut files = Vec::new();
    collect_files(dir, &allowed, &mut files)?;
    files.sort();

    if files.is_empty() {
        return Err(DataError::NoImages {
            dir_type: dir_type.to_string(),
            path:     dir.to_path_buf(),
        });
    }

    tracing::debug!("Found {} {} files in '{}'", files.len(), dir_type, dir.display());

    let labels = vec![dir_type; files.len()];
    Ok((files, labels))
}

/// ".PNG" / "png" / "png " → "png"
fn normalise_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn collect_files(dir: &Path, allowed: &[String], out: &mut Vec<PathBuf>) -> DataResult<()> {
    let entries = fs::read_dir(dir).map_err(|source| DataError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| DataError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if is_hidden(&path) {
            continue;
        }

        if path.is_dir() {
            collect_files(&path, allowed, out)?;
            continue;
        }

        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| allowed.iter().any(|a| a == &e.to_ascii_lowercase()))
            .unwrap_or(false);

        if matches {
            out.push(path);
        }
    }

    Ok(())
}
