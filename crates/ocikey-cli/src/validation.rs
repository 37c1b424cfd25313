use std::path::{Path, PathBuf};

use ocikey_provisioning::RunMode;
use thiserror::Error;

/// File name used for the credential file when development mode runs without
/// `--config`.
pub const DEVELOPMENT_CONFIG_FILE_NAME: &str = "config";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigPathError {
    #[error("--config <path> is required in packaged mode")]
    Missing,
    #[error("--config {0} names a directory, not a file")]
    IsDirectory(PathBuf),
    #[error("directory {0} for the credential file does not exist")]
    ParentMissing(PathBuf),
    #[error("directory {path} for the credential file is not writable: {detail}")]
    ParentNotWritable { path: PathBuf, detail: String },
}

/// Resolves the credential file destination and checks that it can be
/// written before any browser work starts.
pub fn resolve_credential_path(
    config: Option<&Path>,
    run_mode: RunMode,
    cwd: &Path,
) -> Result<PathBuf, ConfigPathError> {
    let requested = match (config, run_mode) {
        (Some(path), _) => path.to_path_buf(),
        (None, RunMode::Development) => PathBuf::from(DEVELOPMENT_CONFIG_FILE_NAME),
        (None, RunMode::Packaged) => return Err(ConfigPathError::Missing),
    };
    let resolved = if requested.is_absolute() {
        requested
    } else {
        cwd.join(requested)
    };

    if resolved.is_dir() {
        return Err(ConfigPathError::IsDirectory(resolved));
    }
    let parent = resolved
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.to_path_buf());
    if !parent.is_dir() {
        return Err(ConfigPathError::ParentMissing(parent));
    }
    ensure_writable(&parent)?;
    Ok(resolved)
}

fn ensure_writable(dir: &Path) -> Result<(), ConfigPathError> {
    tempfile::Builder::new()
        .prefix(".ocikey-write-check")
        .tempfile_in(dir)
        .map(drop)
        .map_err(|error| ConfigPathError::ParentNotWritable {
            path: dir.to_path_buf(),
            detail: error.to_string(),
        })
}
