// ── Claiming inbox files ──
//
// A file is claimed by moving it out of the inbox. The move doubles as
// the "already processed" marker: a claimed file never shows up in a
// later scan.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::sleep_cancellable;
use crate::error::CoreError;

/// Extension of archived raw faxes.
pub const ARCHIVE_EXTENSION: &str = "tif";

/// `yyyyMMddHHmmssffff.tif`: the time down to 100 µs.
pub fn archive_file_name(now: DateTime<Local>) -> String {
    format!(
        "{}{:04}.{ARCHIVE_EXTENSION}",
        now.format("%Y%m%d%H%M%S"),
        now.timestamp_subsec_micros() / 100
    )
}

/// An archive path for `now` that does not exist yet.
///
/// Files claimed within the same tick get a `-1`, `-2`, ... suffix.
pub fn unique_archive_path(archive: &Path, now: DateTime<Local>) -> PathBuf {
    unique_path(archive, &archive_file_name(now))
}

/// `dir/name`, or `dir/<stem>-N.<ext>` if that is already taken.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(name);
    let stem = name.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let extension = name
        .extension()
        .map_or_else(String::new, |e| format!(".{}", e.to_string_lossy()));
    (1_u32..)
        .map(|n| dir.join(format!("{stem}-{n}{extension}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Rename `from` to `to`, copying across file systems when needed.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        other => other,
    }
}

/// Move with a bounded number of attempts and a fixed pause between them.
///
/// Gives up early when `cancel` fires. The source file stays where it
/// was on failure.
pub fn move_with_retry<F>(
    from: &Path,
    to: &Path,
    attempts: u32,
    delay: Duration,
    cancel: &CancellationToken,
    mut mover: F,
) -> Result<(), CoreError>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let attempts = attempts.max(1);
    let mut tried = 0;
    let mut last_error = io::Error::new(io::ErrorKind::Interrupted, "shutdown requested");

    while tried < attempts && !cancel.is_cancelled() {
        tried += 1;
        match mover(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!(
                    path = %from.display(),
                    attempt = tried,
                    error = %e,
                    "move failed"
                );
                last_error = e;
            }
        }
        if tried < attempts && !sleep_cancellable(delay, cancel) {
            break;
        }
    }

    Err(CoreError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        attempts: tried,
        source: last_error,
    })
}
