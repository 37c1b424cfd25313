use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};

/// Writes text using a temp file + rename so readers never observe partial data.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    write_text_atomic_with_mode(path, content, None)
}

/// Same as [`write_text_atomic`], applying `mode` to the temp file before the
/// rename on Unix. The mode is ignored on other platforms.
pub fn write_text_atomic_with_mode(path: &Path, content: &str, mode: Option<u32>) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !parent_dir.is_dir() {
        bail!(
            "destination directory '{}' does not exist",
            parent_dir.display()
        );
    }

    let temp_path = temp_sibling_path(parent_dir, path);
    std::fs::write(&temp_path, content)
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;
    if let Err(error) = apply_mode(&temp_path, mode) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error);
    }
    if let Err(error) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                temp_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}

fn temp_sibling_path(parent_dir: &Path, path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nanos}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("ocikey"),
        std::process::id(),
    );
    parent_dir.join(temp_name)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode else {
        return Ok(());
    };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("failed to set mode {mode:o} on {}", path.display()))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}
