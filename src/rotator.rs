use crate::clock::{Clock, SystemClock};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Append-only file writer that rotates daily and archives monthly.
///
/// Files are laid out as `<root>/<YYYY-MM>/<MM-DD>.log`. Rotation is lazy:
/// the date is checked on every write and a new file is only opened when a
/// write lands on a new day. Clones share the same handle and lock, so one
/// sink can be handed to several writers (or to a `fmt` layer) at once.
#[derive(Clone)]
pub struct RotatingFileSink {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    state: Mutex<Option<OpenFile>>,
}

struct OpenFile {
    day: NaiveDate,
    path: PathBuf,
    file: File,
}

/// I/O failure inside [`RotatingFileSink`], carrying the path involved.
#[derive(thiserror::Error, Debug)]
pub enum RotateError {
    #[error("create log directory {path:?} failed: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("open log file {path:?} failed: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("write to log file {path:?} failed: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("sync log file {path:?} failed: {source}")]
    Sync { path: PathBuf, source: io::Error },

    #[error("close log file {path:?} failed: {source}")]
    Close { path: PathBuf, source: io::Error },
}

impl RotateError {
    fn io(&self) -> &io::Error {
        match self {
            RotateError::CreateDir { source, .. }
            | RotateError::Open { source, .. }
            | RotateError::Write { source, .. }
            | RotateError::Sync { source, .. }
            | RotateError::Close { source, .. } => source,
        }
    }
}

impl From<RotateError> for io::Error {
    fn from(err: RotateError) -> io::Error {
        io::Error::new(err.io().kind(), err)
    }
}

/// Directory and file path for `day` under `root`.
pub fn day_path(root: &Path, day: NaiveDate) -> (PathBuf, PathBuf) {
    let dir = root.join(day.format("%Y-%m").to_string());
    let file = dir.join(day.format("%m-%d.log").to_string());
    (dir, file)
}

impl RotatingFileSink {
    /// Open a sink rooted at `root` using the system clock.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, RotateError> {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    /// Open a sink with an explicit clock. Today's file is opened
    /// immediately so that an unusable root fails construction.
    pub fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, RotateError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| RotateError::CreateDir {
            path: root.clone(),
            source,
        })?;

        let inner = Inner {
            root,
            clock,
            state: Mutex::new(None),
        };
        {
            let mut state = inner.state.lock();
            let today = inner.clock.now().date_naive();
            inner.rotate(&mut state, today)?;
        }

        Ok(RotatingFileSink { inner: Arc::new(inner) })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Path of the currently open file, if any.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.inner.state.lock().as_ref().map(|open| open.path.clone())
    }

    /// Append `buf` to the file for the current day, rotating first if the
    /// day changed or no file is open.
    pub fn write(&self, buf: &[u8]) -> Result<usize, RotateError> {
        // No tracing events under this lock: the sink may be the writer of
        // the subscriber that would receive them.
        let mut state = self.inner.state.lock();
        let today = self.inner.clock.now().date_naive();

        if state.as_ref().map(|open| open.day) != Some(today) {
            self.inner.rotate(&mut state, today)?;
        }

        if let Some(open) = state.as_mut() {
            open.file.write_all(buf).map_err(|source| RotateError::Write {
                path: open.path.clone(),
                source,
            })?;
        }
        Ok(buf.len())
    }

    /// Force written bytes to stable storage. No-op when nothing is open.
    pub fn sync_to_disk(&self) -> Result<(), RotateError> {
        let state = self.inner.state.lock();
        match state.as_ref() {
            Some(open) => open.file.sync_all().map_err(|source| RotateError::Sync {
                path: open.path.clone(),
                source,
            }),
            None => Ok(()),
        }
    }

    /// Sync and release the open handle. A later write reopens today's file.
    pub fn close(&self) -> Result<(), RotateError> {
        let mut state = self.inner.state.lock();
        match state.take() {
            Some(open) => close_file(open),
            None => Ok(()),
        }
    }
}

impl Inner {
    fn rotate(&self, state: &mut Option<OpenFile>, today: NaiveDate) -> Result<(), RotateError> {
        // The old handle is discarded even when closing it fails.
        if let Some(old) = state.take() {
            close_file(old)?;
        }

        let (dir, path) = day_path(&self.root, today);
        fs::create_dir_all(&dir).map_err(|source| RotateError::CreateDir { path: dir, source })?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| RotateError::Open {
                path: path.clone(),
                source,
            })?;

        *state = Some(OpenFile { day: today, path, file });
        Ok(())
    }
}

fn close_file(open: OpenFile) -> Result<(), RotateError> {
    let OpenFile { path, file, .. } = open;
    file.sync_all().map_err(|source| RotateError::Close { path, source })
}

impl Write for &RotatingFileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingFileSink::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Write for RotatingFileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingFileSink::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RotatingFileSink {
    type Writer = &'a RotatingFileSink;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}
