//! Append-only `events.jsonl` writer.
//!
//! Every append takes an exclusive advisory lock on the log file itself, so
//! writers in other processes (or other [`EventLog`] instances in this one)
//! never interleave lines. A failed or short write is rolled back by truncating
//! the file to its length before the write.
//!
//! Lock acquisition blocks without a deadline.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tracing::{debug, warn};

use crate::core::event::{Event, now_timestamp};
use crate::error::{PipelineError, Result};
use crate::io::layout::is_blank;

/// Serializes appends to one log path from a single owner.
///
/// Concurrent callers sharing an `EventLog` are ordered by an in-process mutex;
/// the file lock taken by [`append`] orders them against everyone else.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    guard: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: Event) -> Result<()> {
        // The guarded state is `()`, so a poisoned mutex carries nothing stale.
        let _held = self
            .guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        append(&self.path, event)
    }
}

/// Append one event to the log at `path` as a single JSON line.
///
/// Validation happens before any filesystem access: the path, type, and
/// session must be non-blank. A blank timestamp is filled with the current time.
pub fn append(path: &Path, mut event: Event) -> Result<()> {
    if is_blank(path) {
        return Err(PipelineError::InvalidPath("events file"));
    }
    event.event_type = event.event_type.trim().to_string();
    if event.event_type.is_empty() {
        return Err(PipelineError::InvalidEvent("event type is empty"));
    }
    event.session = event.session.trim().to_string();
    if event.session.is_empty() {
        return Err(PipelineError::InvalidEvent("event session is empty"));
    }
    if event.timestamp.trim().is_empty() {
        event.timestamp = now_timestamp();
    }

    let mut line = serde_json::to_vec(&event).map_err(|source| PipelineError::Encode {
        what: "event",
        source,
    })?;
    line.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PipelineError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| PipelineError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    let _lock = ExclusiveLock::acquire(&file, path)?;
    let mut handle = &file;

    let start = handle
        .seek(SeekFrom::End(0))
        .map_err(|source| PipelineError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    write_line(&mut handle, &line, path, || file.set_len(start))?;
    debug!(event_type = %event.event_type, offset = start, "appended event");
    Ok(())
}

/// Write `line` in one call. On a short or failed write, `truncate` restores
/// the pre-write length and any failure to do so is carried in the error.
fn write_line<W: Write>(
    writer: &mut W,
    line: &[u8],
    path: &Path,
    truncate: impl FnOnce() -> io::Result<()>,
) -> Result<()> {
    match writer.write(line) {
        Ok(written) if written == line.len() => Ok(()),
        Ok(written) => Err(PipelineError::ShortWrite {
            path: path.to_path_buf(),
            written,
            expected: line.len(),
            truncate: rollback(path, truncate),
        }),
        Err(source) => Err(PipelineError::Append {
            path: path.to_path_buf(),
            source,
            truncate: rollback(path, truncate),
        }),
    }
}

fn rollback(path: &Path, truncate: impl FnOnce() -> io::Result<()>) -> Option<io::Error> {
    match truncate() {
        Ok(()) => None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not truncate partial event");
            Some(err)
        }
    }
}

/// Held exclusive lock on an open file; released on drop.
struct ExclusiveLock<'a> {
    file: &'a File,
}

impl<'a> ExclusiveLock<'a> {
    fn acquire(file: &'a File, path: &Path) -> Result<Self> {
        FileExt::lock_exclusive(file).map_err(|source| PipelineError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { file })
    }
}

impl Drop for ExclusiveLock<'_> {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well.
        let _ = FileExt::unlock(self.file);
    }
}

/// Read every event from a log. Blank lines are skipped; a missing file is empty.
pub fn read_events(path: &Path) -> Result<Vec<Event>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(PipelineError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut events = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line).map_err(|err| PipelineError::Read {
            path: path.to_path_buf(),
            source: io::Error::new(
                ErrorKind::InvalidData,
                format!("line {}: {err}", idx + 1),
            ),
        })?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{Cursor, EventType};
    use serde_json::{Map, Value, json};
    use std::sync::Arc;
    use std::thread;

    fn event(event_type: &str, session: &str) -> Event {
        Event {
            timestamp: String::new(),
            event_type: event_type.to_string(),
            session: session.to_string(),
            cursor: None,
            data: Map::new(),
        }
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .expect("read log")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn writes_event_with_cursor_and_data() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("events.jsonl");
        let mut data = Map::new();
        data.insert("ok".to_string(), json!(true));
        let cursor = Cursor {
            node_path: "0".to_string(),
            node_run: 1,
            iteration: 2,
            provider: "codex".to_string(),
        };

        append(
            &path,
            Event::new(EventType::IterationStart, "session-one", Some(cursor.clone()), data),
        )
        .expect("append");

        let stored = read_events(&path).expect("read");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind(), Some(EventType::IterationStart));
        assert_eq!(stored[0].session, "session-one");
        assert!(!stored[0].timestamp.is_empty());
        assert_eq!(stored[0].cursor, Some(cursor));
        assert_eq!(stored[0].data.get("ok"), Some(&json!(true)));
    }

    #[test]
    fn fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/dir/events.jsonl");

        append(&path, event(" session_start ", " s-defaults ")).expect("append");

        let raw = lines(&path);
        assert_eq!(raw.len(), 1);
        let value: Value = serde_json::from_str(&raw[0]).expect("parse");
        assert_eq!(value["type"], json!("session_start"));
        assert_eq!(value["session"], json!("s-defaults"));
        assert_eq!(value["cursor"], Value::Null);
        assert_eq!(value["data"], json!({}));
        assert!(value["ts"].as_str().is_some_and(|ts| ts.ends_with('Z')));
    }

    #[test]
    fn keeps_existing_timestamp() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("events.jsonl");
        let mut stamped = event("error", "s");
        stamped.timestamp = "2026-01-02T03:04:05Z".to_string();

        append(&path, stamped).expect("append");
        assert_eq!(
            read_events(&path).expect("read")[0].timestamp,
            "2026-01-02T03:04:05Z"
        );
    }

    #[test]
    fn appends_in_call_order_after_existing_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("events.jsonl");
        fs::write(&path, "{\"ts\":\"t\",\"type\":\"node_start\",\"session\":\"old\",\"cursor\":null,\"data\":{}}\n")
            .expect("seed");

        append(&path, event("session_start", "s-multi")).expect("first");
        append(&path, event("session_complete", "s-multi")).expect("second");

        let stored = read_events(&path).expect("read");
        let types: Vec<&str> = stored.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["node_start", "session_start", "session_complete"]);
    }

    #[test]
    fn rejects_blank_type_before_io() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("missing-dir/events.jsonl");

        let err = append(&path, event("   ", "s")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidEvent("event type is empty")));
        assert!(!path.parent().expect("parent").exists());
    }

    #[test]
    fn rejects_blank_session_before_io() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("missing-dir/events.jsonl");

        let err = append(&path, event("error", "")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidEvent("event session is empty")));
        assert!(!path.parent().expect("parent").exists());
    }

    #[test]
    fn rejects_empty_path() {
        let err = append(Path::new(""), event("error", "s")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPath(_)));
    }

    #[test]
    fn rejects_whitespace_path_without_creating_it() {
        let err = append(Path::new("  "), event("error", "s")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPath(_)));
        assert!(!Path::new("  ").exists());
    }

    /// Writes the first `keep` bytes to the file, then reports a short write
    /// or an error.
    struct TornWriter<'a> {
        file: &'a File,
        keep: usize,
        fail: bool,
    }

    impl Write for TornWriter<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut file = self.file;
            file.write_all(&buf[..self.keep])?;
            if self.fail {
                Err(io::Error::other("disk full"))
            } else {
                Ok(self.keep)
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn seeded_log(temp: &tempfile::TempDir) -> (PathBuf, File, u64) {
        let path = temp.path().join("events.jsonl");
        append(&path, event("session_start", "s-torn")).expect("seed");
        let mut file = OpenOptions::new().write(true).open(&path).expect("open");
        let start = file.seek(SeekFrom::End(0)).expect("seek");
        (path, file, start)
    }

    #[test]
    fn short_write_is_truncated_back() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (path, file, start) = seeded_log(&temp);
        let line = b"{\"type\":\"error\"}\n";
        let mut writer = TornWriter {
            file: &file,
            keep: 5,
            fail: false,
        };

        let err = write_line(&mut writer, line, &path, || file.set_len(start)).unwrap_err();
        assert!(
            matches!(
                err,
                PipelineError::ShortWrite {
                    written: 5,
                    truncate: None,
                    ..
                }
            ),
            "{err}"
        );
        assert_eq!(fs::metadata(&path).expect("meta").len(), start);
        assert_eq!(read_events(&path).expect("read").len(), 1);
    }

    #[test]
    fn failed_write_is_truncated_back() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (path, file, start) = seeded_log(&temp);
        let mut writer = TornWriter {
            file: &file,
            keep: 3,
            fail: true,
        };

        let err = write_line(&mut writer, b"{\"partial\":1}\n", &path, || {
            file.set_len(start)
        })
        .unwrap_err();
        assert!(
            matches!(err, PipelineError::Append { truncate: None, .. }),
            "{err}"
        );
        assert_eq!(fs::metadata(&path).expect("meta").len(), start);
    }

    #[test]
    fn failed_truncate_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (path, file, _start) = seeded_log(&temp);
        let mut writer = TornWriter {
            file: &file,
            keep: 2,
            fail: false,
        };

        let err = write_line(&mut writer, b"{}\n{}\n", &path, || {
            Err(io::Error::other("read-only filesystem"))
        })
        .unwrap_err();
        match err {
            PipelineError::ShortWrite {
                truncate: Some(truncate),
                ..
            } => assert_eq!(truncate.to_string(), "read-only filesystem"),
            other => panic!("expected short write with truncate error, got {other}"),
        }
    }

    #[test]
    fn shared_instance_serializes_threads() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = Arc::new(EventLog::new(temp.path().join("events.jsonl")));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for n in 0..25 {
                        let mut data = Map::new();
                        data.insert("worker".to_string(), json!(worker));
                        data.insert("n".to_string(), json!(n));
                        log.append(Event::new(EventType::IterationComplete, "s-threads", None, data))
                            .expect("append");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        let raw = lines(log.path());
        assert_eq!(raw.len(), 200);
        for line in &raw {
            serde_json::from_str::<Event>(line).expect("complete line");
        }
    }

    #[test]
    fn read_events_reports_bad_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("events.jsonl");
        fs::write(&path, "\n{\"truncated\":").expect("seed");

        let err = read_events(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn read_events_missing_file_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(
            read_events(&temp.path().join("none.jsonl"))
                .expect("read")
                .is_empty()
        );
    }
}
