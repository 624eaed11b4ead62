//! Still-snapshot persistence.
//!
//! Layout: `{capture_dir}/{YYYY-MM-DD}/{YYYY-MM-DD HH:MM:SS}.jpg`, one date
//! directory per calendar day, created lazily. The snapshot worker in
//! [`crate::daemon`] drives these helpers once per configured interval.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::frame::{Frame, JPEG_QUALITY};

/// Date-partitioned subdirectory for `now`.
pub fn date_dir(base: &Path, now: &DateTime<Local>) -> PathBuf {
    base.join(now.format("%Y-%m-%d").to_string())
}

/// Create the date directory for `now` if absent, returning its path.
pub fn ensure_date_dir(base: &Path, now: &DateTime<Local>) -> Result<PathBuf> {
    let dir = date_dir(base, now);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create capture dir {}", dir.display()))?;
    Ok(dir)
}

/// Full snapshot path for `now`, second precision.
pub fn snapshot_path(base: &Path, now: &DateTime<Local>) -> PathBuf {
    date_dir(base, now).join(format!("{}.jpg", now.format("%Y-%m-%d %H:%M:%S")))
}

/// Encode `frame` as JPEG (fixed quality) and persist it at `path`.
pub fn write_snapshot(path: &Path, frame: &Frame) -> Result<()> {
    let bytes = frame.encode_jpeg(JPEG_QUALITY)?;
    std::fs::write(path, bytes).with_context(|| format!("write snapshot {}", path.display()))?;
    Ok(())
}
