use super::action::{
    Action, FileDeleteAction, FileRenameAction, GzCompressAction, RetentionCleanupAction,
};
use chrono::{DateTime, Local};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

const INDEX_TOKEN: &str = "%i";
const GZ_SUFFIX: &str = ".gz";
const MAX_WINDOW_SIZE: u32 = 20;

#[derive(Error, Debug)]
pub enum RolloverError {
    #[error("Invalid file pattern '{0}': must contain %i")]
    InvalidPattern(String),

    #[error("Invalid rolling window {min}..={max}")]
    InvalidWindow { min: u32, max: u32 },

    #[error("Cannot derive rotated file names from {}", .0.display())]
    InvalidActiveFile(PathBuf),

    #[error("Failed to prepare rolling window: {0}")]
    Io(#[from] io::Error),
}

/// What a rollover should do, as planned by a [`RolloverStrategy`].
pub struct RolloverDescription {
    pub active_file: PathBuf,
    pub append: bool,
    /// Runs on the rolling thread before writing resumes.
    pub synchronous: Option<Box<dyn Action>>,
    /// Runs on its own thread after writing resumes.
    pub asynchronous: Option<Arc<dyn Action>>,
}

impl RolloverDescription {
    pub fn new(active_file: impl Into<PathBuf>, append: bool) -> Self {
        Self {
            active_file: active_file.into(),
            append,
            synchronous: None,
            asynchronous: None,
        }
    }

    pub fn with_synchronous(mut self, action: impl Action + 'static) -> Self {
        self.synchronous = Some(Box::new(action));
        self
    }

    pub fn with_asynchronous(mut self, action: impl Action + 'static) -> Self {
        self.asynchronous = Some(Arc::new(action));
        self
    }
}

impl fmt::Debug for RolloverDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RolloverDescription")
            .field("active_file", &self.active_file)
            .field("append", &self.append)
            .field("synchronous", &self.synchronous.is_some())
            .field("asynchronous", &self.asynchronous.is_some())
            .finish()
    }
}

/// Names rotated files and plans the file operations of a rollover.
#[cfg_attr(test, automock)]
pub trait RolloverStrategy: Send {
    /// Consulted once when the appender activates; may choose a different
    /// initial active file.
    fn initialize(
        &mut self,
        _configured_file: &Path,
        _append: bool,
    ) -> Result<Option<RolloverDescription>, RolloverError> {
        Ok(None)
    }

    /// `Ok(None)` means there is nothing to roll.
    fn plan_rollover(
        &mut self,
        active_file: &Path,
        append: bool,
    ) -> Result<Option<RolloverDescription>, RolloverError>;
}

/// Keeps `app.log` as the active file and shifts older files through a
/// numbered window: `app.log` becomes index `min`, index `max` is deleted.
///
/// A pattern ending in `.gz` makes the freshly rotated file compress in the
/// background.
#[derive(Debug, Clone)]
pub struct FixedWindowRollingStrategy {
    file_pattern: String,
    min_index: u32,
    max_index: u32,
}

impl FixedWindowRollingStrategy {
    pub fn new(file_pattern: impl Into<String>, min_index: u32, max_index: u32) -> Result<Self, RolloverError> {
        let file_pattern = file_pattern.into();
        if !file_pattern.contains(INDEX_TOKEN) {
            return Err(RolloverError::InvalidPattern(file_pattern));
        }
        if min_index > max_index {
            return Err(RolloverError::InvalidWindow {
                min: min_index,
                max: max_index,
            });
        }
        Ok(Self {
            file_pattern,
            min_index,
            // Same cap as the classic fixed-window policy
            max_index: max_index.min(min_index.saturating_add(MAX_WINDOW_SIZE - 1)),
        })
    }

    /// Window `app.log.1` .. `app.log.{max_index}` next to `active_file`.
    pub fn numbered(active_file: &Path, max_index: u32) -> Result<Self, RolloverError> {
        Self::new(format!("{}.{INDEX_TOKEN}", active_file.display()), 1, max_index)
    }

    pub fn compresses(&self) -> bool {
        self.file_pattern.ends_with(GZ_SUFFIX)
    }

    pub fn window(&self) -> (u32, u32) {
        (self.min_index, self.max_index)
    }

    /// Name of the file at `index`, as stored in the window.
    pub fn file_at(&self, index: u32) -> PathBuf {
        PathBuf::from(self.file_pattern.replace(INDEX_TOKEN, &index.to_string()))
    }

    fn uncompressed(path: &Path) -> PathBuf {
        let text = path.to_string_lossy();
        PathBuf::from(text.strip_suffix(GZ_SUFFIX).unwrap_or(&text))
    }

    /// A compression closed before it started leaves the previous generation
    /// under the uncompressed staging name. Move it into the window first so
    /// the coming rename cannot replace it.
    fn recover_staging(&self) -> io::Result<()> {
        let slot = self.file_at(self.min_index);
        let staging = Self::uncompressed(&slot);
        if !staging.exists() {
            return Ok(());
        }

        self.purge()?;
        GzCompressAction::new(&staging, &slot, true).execute()?;
        Ok(())
    }

    /// Make room at `min_index` by shifting every existing file up one slot.
    fn purge(&self) -> io::Result<()> {
        FileDeleteAction::new(self.file_at(self.max_index)).execute()?;

        for index in (self.min_index..self.max_index).rev() {
            let source = self.file_at(index);
            if source.exists() {
                FileRenameAction::new(source, self.file_at(index + 1))
                    .rename_empty_files(true)
                    .execute()?;
            }
        }
        Ok(())
    }
}

impl RolloverStrategy for FixedWindowRollingStrategy {
    fn plan_rollover(
        &mut self,
        active_file: &Path,
        _append: bool,
    ) -> Result<Option<RolloverDescription>, RolloverError> {
        if !active_file.exists() {
            return Ok(None);
        }

        if self.compresses() {
            self.recover_staging()?;
        }
        self.purge()?;

        let slot = self.file_at(self.min_index);
        let description = if self.compresses() {
            let staging = Self::uncompressed(&slot);
            RolloverDescription::new(active_file, false)
                .with_synchronous(FileRenameAction::new(active_file, &staging))
                .with_asynchronous(GzCompressAction::new(staging, slot, true))
        } else {
            RolloverDescription::new(active_file, false)
                .with_synchronous(FileRenameAction::new(active_file, slot))
        };
        Ok(Some(description))
    }
}

/// Starts a new `{stem}_{YYYYmmdd_HHMMSS}.{ext}` file on every rollover and
/// leaves the previous ones where they are.
///
/// With a retention quota, an asynchronous cleanup removes the oldest files of
/// the family after each rollover.
#[derive(Debug, Clone)]
pub struct TimestampRollingStrategy {
    max_total_size: Option<u64>,
    last_issued: Option<PathBuf>,
}

impl TimestampRollingStrategy {
    pub fn new() -> Self {
        Self {
            max_total_size: None,
            last_issued: None,
        }
    }

    pub fn with_retention(mut self, max_total_size: u64) -> Self {
        self.max_total_size = Some(max_total_size);
        self
    }

    fn parts(base: &Path) -> Result<(PathBuf, String, Option<String>), RolloverError> {
        let stem = base
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| RolloverError::InvalidActiveFile(base.to_path_buf()))?;
        // A stamped name maps back to the family it came from
        let stem = strip_stamp(stem).to_string();
        let extension = base
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);
        let directory = base
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Ok((directory, stem, extension))
    }

    /// Next unused stamped name for the family of `base`.
    pub fn next_file(&mut self, base: &Path, now: DateTime<Local>) -> Result<PathBuf, RolloverError> {
        let (directory, stem, extension) = Self::parts(base)?;
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let name = |suffix: Option<u32>| {
            let mut name = format!("{stem}_{stamp}");
            if let Some(n) = suffix {
                name.push_str(&format!("_{n}"));
            }
            if let Some(ext) = &extension {
                name.push('.');
                name.push_str(ext);
            }
            directory.join(name)
        };

        let mut candidate = name(None);
        let mut n = 1;
        while candidate.exists() || self.last_issued.as_ref() == Some(&candidate) {
            candidate = name(Some(n));
            n += 1;
        }
        self.last_issued = Some(candidate.clone());
        Ok(candidate)
    }

    fn cleanup_for(&self, base: &Path, active: &Path) -> Result<Option<RetentionCleanupAction>, RolloverError> {
        let Some(quota) = self.max_total_size else {
            return Ok(None);
        };
        let (directory, stem, _) = Self::parts(base)?;
        Ok(Some(
            RetentionCleanupAction::new(directory, format!("{stem}_"), quota).protect(active),
        ))
    }
}

impl Default for TimestampRollingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// `app_20250115_103045_2` -> `app`; anything else is returned unchanged.
fn strip_stamp(stem: &str) -> &str {
    fn split_stamp(s: &str) -> Option<&str> {
        let cut = s.len().checked_sub(16)?;
        let (head, stamp) = (s.get(..cut)?, s.get(cut..)?);
        let is_stamp = stamp.bytes().enumerate().all(|(i, b)| match i {
            0 | 9 => b == b'_',
            _ => b.is_ascii_digit(),
        });
        (is_stamp && !head.is_empty()).then_some(head)
    }

    if let Some(family) = split_stamp(stem) {
        return family;
    }
    // Collision counter after the stamp
    if let Some((head, counter)) = stem.rsplit_once('_')
        && !counter.is_empty()
        && counter.bytes().all(|b| b.is_ascii_digit())
        && let Some(family) = split_stamp(head)
    {
        return family;
    }
    stem
}

impl RolloverStrategy for TimestampRollingStrategy {
    fn initialize(
        &mut self,
        configured_file: &Path,
        _append: bool,
    ) -> Result<Option<RolloverDescription>, RolloverError> {
        let active = self.next_file(configured_file, Local::now())?;
        Ok(Some(RolloverDescription::new(active, true)))
    }

    fn plan_rollover(
        &mut self,
        active_file: &Path,
        _append: bool,
    ) -> Result<Option<RolloverDescription>, RolloverError> {
        let next = self.next_file(active_file, Local::now())?;
        let mut description = RolloverDescription::new(&next, true);
        if let Some(cleanup) = self.cleanup_for(active_file, &next)? {
            description = description.with_asynchronous(cleanup);
        }
        Ok(Some(description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_pattern_must_contain_index() {
        assert!(matches!(
            FixedWindowRollingStrategy::new("app.log", 1, 3),
            Err(RolloverError::InvalidPattern(_))
        ));
        assert!(matches!(
            FixedWindowRollingStrategy::new("app.%i.log", 3, 1),
            Err(RolloverError::InvalidWindow { min: 3, max: 1 })
        ));
    }

    #[test]
    fn test_fixed_window_shifts_existing_files() {
        let dir = TempDir::new().unwrap();
        let active = dir.path().join("app.log");
        let mut strategy = FixedWindowRollingStrategy::numbered(&active, 2).unwrap();

        fs::write(&active, "current").unwrap();
        fs::write(strategy.file_at(1), "older").unwrap();
        fs::write(strategy.file_at(2), "oldest").unwrap();

        let description = strategy.plan_rollover(&active, true).unwrap().unwrap();
        assert_eq!(description.active_file, active);
        assert!(!description.append);
        assert!(description.asynchronous.is_none());

        // Window shifted during planning; oldest dropped
        assert_eq!(fs::read_to_string(strategy.file_at(2)).unwrap(), "older");
        assert!(!strategy.file_at(1).exists());

        assert!(description.synchronous.unwrap().execute().unwrap());
        assert_eq!(fs::read_to_string(strategy.file_at(1)).unwrap(), "current");
        assert!(!active.exists());
    }

    #[test]
    fn test_fixed_window_with_gz_pattern_compresses_in_background() {
        let dir = TempDir::new().unwrap();
        let active = dir.path().join("app.log");
        let pattern = format!("{}/app.%i.log.gz", dir.path().display());
        let mut strategy = FixedWindowRollingStrategy::new(pattern, 1, 3).unwrap();
        assert!(strategy.compresses());

        fs::write(&active, "payload").unwrap();
        let description = strategy.plan_rollover(&active, true).unwrap().unwrap();
        assert!(description.synchronous.unwrap().execute().unwrap());
        assert!(dir.path().join("app.1.log").exists());

        assert!(description.asynchronous.unwrap().execute().unwrap());
        assert!(dir.path().join("app.1.log.gz").exists());
        assert!(!dir.path().join("app.1.log").exists());
    }

    #[test]
    fn test_leftover_staging_file_is_compressed_before_rename() {
        let dir = TempDir::new().unwrap();
        let active = dir.path().join("app.log");
        let pattern = format!("{}/app.%i.log.gz", dir.path().display());
        let mut strategy = FixedWindowRollingStrategy::new(pattern, 1, 3).unwrap();

        // Previous generation whose compression never ran
        fs::write(dir.path().join("app.1.log"), "previous").unwrap();
        fs::write(&active, "current").unwrap();

        let description = strategy.plan_rollover(&active, true).unwrap().unwrap();
        let mut decoded = String::new();
        GzDecoder::new(fs::File::open(dir.path().join("app.2.log.gz")).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "previous");
        assert!(!dir.path().join("app.1.log.gz").exists());

        assert!(description.synchronous.unwrap().execute().unwrap());
        assert_eq!(fs::read_to_string(dir.path().join("app.1.log")).unwrap(), "current");
    }

    #[test]
    fn test_fixed_window_skips_missing_active_file() {
        let dir = TempDir::new().unwrap();
        let active = dir.path().join("app.log");
        let mut strategy = FixedWindowRollingStrategy::numbered(&active, 3).unwrap();
        assert!(strategy.plan_rollover(&active, true).unwrap().is_none());
    }

    #[test]
    fn test_timestamp_names_are_unique_per_second() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let now = Local.with_ymd_and_hms(2025, 1, 15, 10, 30, 45).unwrap();
        let mut strategy = TimestampRollingStrategy::new();

        let first = strategy.next_file(&base, now).unwrap();
        assert_eq!(first, dir.path().join("app_20250115_103045.log"));
        fs::write(&first, "x").unwrap();

        let second = strategy.next_file(&first, now).unwrap();
        assert_eq!(second, dir.path().join("app_20250115_103045_1.log"));

        let third = strategy.next_file(&second, now).unwrap();
        assert_eq!(third, dir.path().join("app_20250115_103045_2.log"));
    }

    #[test]
    fn test_strip_stamp_recovers_family_stem() {
        assert_eq!(strip_stamp("app_20250115_103045"), "app");
        assert_eq!(strip_stamp("app_20250115_103045_3"), "app");
        assert_eq!(strip_stamp("my_app"), "my_app");
        assert_eq!(strip_stamp("app"), "app");
    }

    #[test]
    fn test_timestamp_rollover_attaches_retention() {
        let dir = TempDir::new().unwrap();
        let mut strategy = TimestampRollingStrategy::new().with_retention(1024);

        let initial = strategy
            .initialize(&dir.path().join("app.log"), false)
            .unwrap()
            .unwrap();
        assert!(initial.append);
        assert!(initial.asynchronous.is_none());

        let next = strategy
            .plan_rollover(&initial.active_file, true)
            .unwrap()
            .unwrap();
        assert_ne!(next.active_file, initial.active_file);
        assert!(next.synchronous.is_none());
        assert!(next.asynchronous.is_some());
    }
}
