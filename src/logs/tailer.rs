//! Polls a fixed set of log files and feeds newly appended bytes into the
//! shared [`LogBuffer`], without ever replaying content that predates the
//! tailer's start.

use std::fs::Metadata;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::context::Context;

use super::buffer::LogBuffer;
use super::{LogCategory, LogEntry, LogSource};

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WatchedFile {
    pub path: PathBuf,
    pub category: LogCategory,
}

impl WatchedFile {
    pub fn new(path: PathBuf, category: LogCategory) -> Self {
        Self { path, category }
    }
}

/// The default watched set: `~/.hekabrain/{debug-summary.txt, debug-all.txt,
/// browser-errors.txt}`, mapped to system/console/renderer respectively.
/// Returns an empty set if the home directory cannot be resolved.
pub fn default_watched_files() -> Vec<WatchedFile> {
    let Some(home) = directories::UserDirs::new() else {
        return Vec::new();
    };
    let base = home.home_dir().join(".hekabrain");
    vec![
        WatchedFile::new(base.join("debug-summary.txt"), LogCategory::System),
        WatchedFile::new(base.join("debug-all.txt"), LogCategory::Console),
        WatchedFile::new(base.join("browser-errors.txt"), LogCategory::Renderer),
    ]
}

struct FileCursor {
    watched: WatchedFile,
    recorded_size: u64,
    recorded_mtime: Option<SystemTime>,
}

impl FileCursor {
    fn new(watched: WatchedFile) -> Self {
        let (size, mtime) = stat(&watched.path).unwrap_or((0, None));
        Self {
            watched,
            recorded_size: size,
            recorded_mtime: mtime,
        }
    }

    /// Reads any newly appended bytes and pushes classified entries into
    /// `buffer`. Returns silently on any I/O error: the file may appear,
    /// rotate, or vanish between polls, and none of that is fatal.
    fn poll(&mut self, buffer: &LogBuffer, now_ms: i64, mut on_entry: impl FnMut(LogEntry)) {
        let Some((current_size, current_mtime)) = stat(&self.watched.path) else {
            return;
        };

        if current_size < self.recorded_size {
            // truncated or rotated away from under us; resume from the start
            self.recorded_size = 0;
            self.recorded_mtime = None;
        }

        if current_size == self.recorded_size && current_mtime == self.recorded_mtime {
            return;
        }

        match read_appended(&self.watched.path, self.recorded_size, current_size) {
            Ok(appended) => {
                buffer.push_raw(&appended, LogSource::File, self.watched.category, now_ms, &mut on_entry);
                self.recorded_size = current_size;
                self.recorded_mtime = current_mtime;
            }
            Err(err) => {
                debug!(path = %self.watched.path.display(), error = %err, "tailer read failed, retrying next poll");
            }
        }
    }
}

fn stat(path: &std::path::Path) -> Option<(u64, Option<SystemTime>)> {
    let metadata: Metadata = std::fs::metadata(path).ok()?;
    Some((metadata.len(), metadata.modified().ok()))
}

fn read_appended(path: &std::path::Path, start: u64, end: u64) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let mut buf = vec![0u8; (end - start) as usize];
    file.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Runs the tailer loop until `ctx` is cancelled. `clock` supplies the
/// timestamp for pushed entries (epoch milliseconds), kept injectable for
/// tests.
pub fn run(
    watched: Vec<WatchedFile>,
    buffer: Arc<LogBuffer>,
    ctx: Context<bool>,
    clock: impl Fn() -> i64,
    on_entry: impl Fn(LogEntry) + Send + 'static,
) {
    let mut cursors: Vec<FileCursor> = watched.into_iter().map(FileCursor::new).collect();
    loop {
        for cursor in cursors.iter_mut() {
            cursor.poll(&buffer, clock(), &on_entry);
        }
        let (lock, cvar) = ctx.get_lock_cvar();
        let guard = lock.lock().expect("tailer context mutex poisoned");
        if *guard {
            return;
        }
        let (guard, _) = cvar
            .wait_timeout(guard, POLL_INTERVAL)
            .expect("tailer context condvar poisoned");
        if *guard {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn epoch_ms() -> i64 {
        0
    }

    #[test]
    fn skips_absent_file() {
        let dir = tempdir().unwrap();
        let watched = WatchedFile::new(dir.path().join("missing.txt"), LogCategory::System);
        let mut cursor = FileCursor::new(watched);
        let buffer = LogBuffer::new();
        cursor.poll(&buffer, epoch_ms(), |_| {});
        assert!(buffer.is_empty());
    }

    #[test]
    fn does_not_replay_preexisting_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "old line 1\nold line 2\n").unwrap();

        let watched = WatchedFile::new(path.clone(), LogCategory::Console);
        let mut cursor = FileCursor::new(watched);
        let buffer = LogBuffer::new();
        cursor.poll(&buffer, epoch_ms(), |_| {});
        assert!(buffer.is_empty());
    }

    #[test]
    fn reads_only_appended_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "old line\n").unwrap();

        let watched = WatchedFile::new(path.clone(), LogCategory::Console);
        let mut cursor = FileCursor::new(watched);
        let buffer = LogBuffer::new();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "new line one").unwrap();
        writeln!(file, "new line two").unwrap();
        drop(file);

        cursor.poll(&buffer, epoch_ms(), |_| {});
        let logs = buffer.get_logs(None, None);
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "new line one");
        assert_eq!(logs[1].message, "new line two");
    }

    #[test]
    fn truncation_resets_to_offset_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "0123456789\n").unwrap();

        let watched = WatchedFile::new(path.clone(), LogCategory::Console);
        let mut cursor = FileCursor::new(watched);
        let buffer = LogBuffer::new();
        cursor.poll(&buffer, epoch_ms(), |_| {});

        std::fs::write(&path, "short\n").unwrap();
        cursor.poll(&buffer, epoch_ms(), |_| {});

        let logs = buffer.get_logs(None, None);
        assert_eq!(logs.last().unwrap().message, "short");
    }

    #[test]
    fn unchanged_file_emits_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "hello\n").unwrap();

        let watched = WatchedFile::new(path.clone(), LogCategory::Console);
        let mut cursor = FileCursor::new(watched);
        let buffer = LogBuffer::new();
        cursor.poll(&buffer, epoch_ms(), |_| {});
        cursor.poll(&buffer, epoch_ms(), |_| {});
        assert!(buffer.is_empty());
    }
}
