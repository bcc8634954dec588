//! Backup naming and crash-safe file replacement.

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tempfile::Builder;

use crate::error::{ConfigError, Result};
use crate::options::ManagerOptions;

/// Default backup location for `file`: `<dir>/<file name>.<timestamp>.bak`.
///
/// `<dir>` is `options.backup_dir` when set, otherwise the file's own
/// directory. A numeric suffix is added when that name is already taken.
pub(crate) fn default_backup_path(
    file: &Path,
    options: &ManagerOptions,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    let mut stamp = String::new();
    write!(stamp, "{}", now.format(&options.backup_timestamp_format)).map_err(|err| {
        ConfigError::validation(
            "backup_timestamp_format",
            format!("'{}': {err}", options.backup_timestamp_format),
        )
    })?;

    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ConfigError::not_found("file name of", file.display().to_string()))?;

    let directory = match &options.backup_dir {
        Some(dir) => dir.clone(),
        None => parent_dir(file).to_path_buf(),
    };

    let candidate = directory.join(format!("{file_name}.{stamp}.bak"));
    Ok(first_free(candidate))
}

fn first_free(candidate: PathBuf) -> PathBuf {
    if !candidate.exists() {
        return candidate;
    }

    let base = candidate.as_os_str().to_os_string();
    (1u32..)
        .map(|counter| {
            let mut name = base.clone();
            name.push(format!(".{counter}"));
            PathBuf::from(name)
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Byte-for-byte copy of `source` to `target`, creating parent directories.
pub(crate) fn copy_file(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| ConfigError::io("creating backup directory", parent, err))?;
    }
    fs::copy(source, target).map_err(|err| ConfigError::io("copying backup of", source, err))?;
    tracing::info!(source = %source.display(), backup = %target.display(), "backup created");
    Ok(())
}

/// Replace `path` with `contents` via a temporary file in the same directory,
/// so readers never observe a partially written file. Existing permissions
/// are carried over.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent)
        .map_err(|err| ConfigError::io("creating directory for", path, err))?;

    let mut temp_file = Builder::new()
        .prefix(".ossec-config")
        .tempfile_in(parent)
        .map_err(|err| ConfigError::io("creating temporary file for", path, err))?;
    temp_file
        .write_all(contents)
        .map_err(|err| ConfigError::io("writing temporary file for", path, err))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|err| ConfigError::io("flushing temporary file for", path, err))?;

    if let Ok(metadata) = fs::metadata(path) {
        temp_file
            .as_file()
            .set_permissions(metadata.permissions())
            .map_err(|err| ConfigError::io("copying permissions to", path, err))?;
    }

    temp_file
        .persist(path)
        .map_err(|err| ConfigError::io("replacing", path, err.error))?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
