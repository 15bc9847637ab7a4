//! Temp-file-then-rename persistence of a single JSON document.
//!
//! The canonical file is only ever replaced by `rename`, so a reader sees
//! either the previous document or the next one, never a prefix. A crash
//! before the rename leaves a stray temp file and the old document intact.

use roster_engine::{Error, Timestamp};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const TEMP_SUFFIX: &str = ".tmp";

/// Serialize `value` and atomically replace `path` with it.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| Error::Storage(e.to_string()))?;

    if let Some(dir) = parent_dir(path) {
        fs::create_dir_all(dir).await.map_err(io_error(path))?;
    }

    let temp = temp_path(path);
    if let Err(err) = write_and_sync(&temp, &bytes).await {
        let _ = fs::remove_file(&temp).await;
        return Err(io_error(path)(err));
    }

    if let Err(err) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(io_error(path)(err));
    }

    sync_dir(path).await;
    Ok(())
}

/// Move an unreadable store file aside as `<name>.corrupt-<millis>`.
///
/// Best-effort: returns `None` when the file could not be moved.
pub async fn backup_corrupt(path: &Path, now: Timestamp) -> Option<PathBuf> {
    let mut name = path.file_name()?.to_os_string();
    name.push(format!(".corrupt-{}", now));
    let backup = path.with_file_name(name);

    match fs::rename(path, &backup).await {
        Ok(()) => Some(backup),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Failed to back up corrupt store file");
            None
        }
    }
}

/// Delete temp files a crashed writer left next to `path`.
pub async fn remove_stale_temps(path: &Path) -> usize {
    let (Some(dir), Some(prefix)) = (parent_dir(path), temp_prefix(path)) else {
        return 0;
    };
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return 0;
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix.as_str())
            && name.ends_with(TEMP_SUFFIX)
            && fs::remove_file(entry.path()).await.is_ok()
        {
            removed += 1;
        }
    }

    if removed > 0 {
        tracing::info!(path = %path.display(), removed, "Removed stale temp files");
    }
    removed
}

/// Temp file for one write: `.<name>.<uuid>.tmp` in the same directory,
/// so the rename never crosses a filesystem.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let prefix = temp_prefix(path).unwrap_or_else(|| ".store.".to_string());
    let mut name = OsString::from(prefix);
    name.push(uuid::Uuid::new_v4().simple().to_string());
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

fn temp_prefix(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    Some(format!(".{}.", name))
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|dir| !dir.as_os_str().is_empty())
}

async fn write_and_sync(temp: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(unix)]
async fn sync_dir(path: &Path) {
    if let Some(dir) = parent_dir(path) {
        if let Ok(handle) = fs::File::open(dir).await {
            let _ = handle.sync_all().await;
        }
    }
}

#[cfg(not(unix))]
async fn sync_dir(_path: &Path) {}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> Error + '_ {
    move |err| Error::Storage(format!("{}: {}", path.display(), err))
}
