//! Resolution of the file names used by `#include`, `ExecuteAFile` and
//! `LoadFunctionLibrary`.

use std::path::{Path, PathBuf};

/// Find `name` relative to the directory of `current_file`, then in each
/// of `search_paths`.
///
/// Returns the first candidate that exists. When none does, the candidate
/// relative to the current file is returned so the caller's read error
/// names a sensible path.
pub fn resolve(name: &str, current_file: Option<&Path>, search_paths: &[PathBuf]) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let local = match current_file.and_then(Path::parent) {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    };
    if local.exists() {
        return local;
    }

    search_paths
        .iter()
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.exists())
        .unwrap_or(local)
}
