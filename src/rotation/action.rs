//! File operations performed around a rollover.
//!
//! Synchronous actions run on the thread doing the rollover, under the
//! coordinator lock. Asynchronous actions run on a short-lived thread of their
//! own and must honour [`Action::close`] when it arrives before they start.

use chrono::{DateTime, Local};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

const COPY_CHUNK_SIZE: usize = 8 * 1024;

pub trait Action: Send + Sync {
    /// Perform the action. `Ok(false)` means it did not complete but left
    /// things in a consistent state.
    fn execute(&self) -> io::Result<bool>;

    /// Ask the action to stop. An action closed before it starts does nothing.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

#[derive(Debug, Default)]
struct Cancellation(AtomicBool);

impl Cancellation {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Rename `source` to `destination`, replacing it.
#[derive(Debug)]
pub struct FileRenameAction {
    source: PathBuf,
    destination: PathBuf,
    rename_empty_files: bool,
    cancellation: Cancellation,
}

impl FileRenameAction {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            rename_empty_files: false,
            cancellation: Cancellation::default(),
        }
    }

    /// By default an empty source is deleted instead of renamed.
    pub fn rename_empty_files(mut self, rename: bool) -> Self {
        self.rename_empty_files = rename;
        self
    }
}

impl Action for FileRenameAction {
    fn execute(&self) -> io::Result<bool> {
        if self.cancellation.is_cancelled() {
            return Ok(false);
        }

        let metadata = match fs::metadata(&self.source) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        if metadata.len() == 0 && !self.rename_empty_files {
            fs::remove_file(&self.source)?;
            return Ok(true);
        }

        if let Some(parent) = self.destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&self.source, &self.destination)?;
        debug!(
            from = %self.source.display(),
            to = %self.destination.display(),
            "Renamed log file"
        );
        Ok(true)
    }

    fn close(&self) {
        self.cancellation.cancel();
    }

    fn is_closed(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Delete a file; a missing file counts as success.
#[derive(Debug)]
pub struct FileDeleteAction {
    path: PathBuf,
    cancellation: Cancellation,
}

impl FileDeleteAction {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cancellation: Cancellation::default(),
        }
    }
}

impl Action for FileDeleteAction {
    fn execute(&self) -> io::Result<bool> {
        if self.cancellation.is_cancelled() {
            return Ok(false);
        }
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }

    fn close(&self) {
        self.cancellation.cancel();
    }

    fn is_closed(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Gzip `source` into `destination`.
///
/// Closing only prevents a compression that has not started; one already
/// running completes, so the rotated file always ends up somewhere. A failed
/// compression removes the partial destination and leaves the source untouched.
#[derive(Debug)]
pub struct GzCompressAction {
    source: PathBuf,
    destination: PathBuf,
    delete_source: bool,
    cancellation: Cancellation,
}

impl GzCompressAction {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        delete_source: bool,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            delete_source,
            cancellation: Cancellation::default(),
        }
    }

    fn compress(&self, mut input: File) -> io::Result<()> {
        let output = File::create(&self.destination)?;
        let mut encoder = GzEncoder::new(output, Compression::default());
        let mut chunk = vec![0u8; COPY_CHUNK_SIZE];

        loop {
            let read = input.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            encoder.write_all(&chunk[..read])?;
        }

        encoder.finish()?.sync_all()
    }
}

impl Action for GzCompressAction {
    fn execute(&self) -> io::Result<bool> {
        if self.cancellation.is_cancelled() {
            return Ok(false);
        }

        let input = match File::open(&self.source) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        match self.compress(input) {
            Ok(()) => {
                if self.delete_source {
                    fs::remove_file(&self.source)?;
                }
                debug!(
                    source = %self.source.display(),
                    destination = %self.destination.display(),
                    "Compressed rotated log file"
                );
                Ok(true)
            }
            Err(e) => {
                let _ = fs::remove_file(&self.destination);
                Err(e)
            }
        }
    }

    fn close(&self) {
        self.cancellation.cancel();
    }

    fn is_closed(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Delete the oldest files of a rolling family until the family fits a quota.
///
/// Files belong to the family when their name starts with `prefix`. The
/// newest file and the `protected` file (normally the active one) are never
/// removed.
#[derive(Debug)]
pub struct RetentionCleanupAction {
    directory: PathBuf,
    prefix: String,
    max_total_bytes: u64,
    protected: Option<PathBuf>,
    cancellation: Cancellation,
}

impl RetentionCleanupAction {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>, max_total_bytes: u64) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            max_total_bytes,
            protected: None,
            cancellation: Cancellation::default(),
        }
    }

    pub fn protect(mut self, path: impl Into<PathBuf>) -> Self {
        self.protected = Some(path.into());
        self
    }

    fn family(&self) -> io::Result<Vec<(PathBuf, u64, DateTime<Local>)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            let path = entry.path();
            let in_family = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&self.prefix));
            if !in_family {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified: DateTime<Local> = metadata.modified()?.into();
            files.push((path, metadata.len(), modified));
        }

        // Oldest first; names carry the timestamp so they break ties
        files.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.0.cmp(&b.0)));
        Ok(files)
    }

    fn is_protected(&self, path: &Path) -> bool {
        self.protected.as_deref() == Some(path)
    }
}

impl Action for RetentionCleanupAction {
    fn execute(&self) -> io::Result<bool> {
        if self.cancellation.is_cancelled() {
            return Ok(false);
        }

        let files = self.family()?;
        let mut total: u64 = files.iter().map(|(_, size, _)| *size).sum();
        if total <= self.max_total_bytes {
            return Ok(true);
        }

        info!(
            directory = %self.directory.display(),
            total,
            limit = self.max_total_bytes,
            "Rotated logs exceed retention quota, removing oldest"
        );

        let newest = files.len().saturating_sub(1);
        for (idx, (path, size, _)) in files.iter().enumerate() {
            if idx == newest || total <= self.max_total_bytes {
                break;
            }
            if self.is_protected(path) {
                continue;
            }
            if self.cancellation.is_cancelled() {
                return Ok(false);
            }
            match fs::remove_file(path) {
                Ok(()) => {
                    warn!(path = %path.display(), size, "Removed rotated log file");
                    total = total.saturating_sub(*size);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove rotated log file"),
            }
        }

        Ok(total <= self.max_total_bytes)
    }

    fn close(&self) {
        self.cancellation.cancel();
    }

    fn is_closed(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Runs its members in order and stops at the first failure.
pub struct CompositeAction {
    actions: Vec<Box<dyn Action>>,
    cancellation: Cancellation,
}

impl CompositeAction {
    pub fn new(actions: Vec<Box<dyn Action>>) -> Self {
        Self {
            actions,
            cancellation: Cancellation::default(),
        }
    }
}

impl Action for CompositeAction {
    fn execute(&self) -> io::Result<bool> {
        for action in &self.actions {
            if self.cancellation.is_cancelled() || !action.execute()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn close(&self) {
        self.cancellation.cancel();
        for action in &self.actions {
            action.close();
        }
    }

    fn is_closed(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
