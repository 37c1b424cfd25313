use std::path::{Path, PathBuf};

/// Resolves `path` against the current working directory without touching the
/// file system. Falls back to the path as given if the working directory is
/// unavailable.
pub fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Absolute path rendered with `/` separators, the form SDK config parsers
/// accept on every platform.
pub fn forward_slash_path(path: &Path) -> String {
    absolute_path(path).to_string_lossy().replace('\\', "/")
}
