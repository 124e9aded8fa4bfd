use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// How bytes reach the active file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Flush after every event.
    pub immediate_flush: bool,
    /// Write through a `BufWriter` of `io_buffer_size` bytes.
    pub buffered_io: bool,
    pub io_buffer_size: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            immediate_flush: true,
            buffered_io: false,
            io_buffer_size: 8 * 1024,
        }
    }
}

enum Output {
    Direct(File),
    Buffered(BufWriter<File>),
}

/// The open active file.
pub(crate) struct Target {
    path: PathBuf,
    output: Output,
}

impl Target {
    /// Open `path`, creating the parent tree once if it is missing. Returns the
    /// target and the file's length after opening.
    pub(crate) fn open(path: &Path, append: bool, settings: &CoordinatorSettings) -> io::Result<(Self, u64)> {
        let file = open_file(path, append)?;
        let len = file.metadata()?.len();
        let output = if settings.buffered_io {
            Output::Buffered(BufWriter::with_capacity(settings.io_buffer_size, file))
        } else {
            Output::Direct(file)
        };
        Ok((
            Self {
                path: path.to_path_buf(),
                output,
            },
            len,
        ))
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn write_str(&mut self, text: &str, flush: bool) -> io::Result<()> {
        match &mut self.output {
            Output::Direct(file) => file.write_all(text.as_bytes()),
            Output::Buffered(writer) => {
                writer.write_all(text.as_bytes())?;
                if flush {
                    writer.flush()?;
                }
                Ok(())
            }
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match &mut self.output {
            Output::Direct(file) => file.flush(),
            Output::Buffered(writer) => writer.flush(),
        }
    }

    /// Write the footer if any, then flush. The file closes on drop.
    pub(crate) fn finish(mut self, footer: Option<&str>) -> io::Result<()> {
        if let Some(footer) = footer {
            self.write_str(footer, false)?;
        }
        self.flush()
    }
}

fn open_file(path: &Path, append: bool) -> io::Result<File> {
    let open = || {
        OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
    };

    match open() {
        Err(e) if e.kind() == io::ErrorKind::NotFound => match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                fs::create_dir_all(parent)?;
                open()
            }
            _ => Err(e),
        },
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/app.log");

        let (mut target, len) = Target::open(&path, true, &CoordinatorSettings::default()).unwrap();
        assert_eq!(len, 0);
        target.write_str("hello\n", true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_append_reports_existing_length_and_truncate_resets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "0123456789").unwrap();

        let (_, len) = Target::open(&path, true, &CoordinatorSettings::default()).unwrap();
        assert_eq!(len, 10);

        let (_, len) = Target::open(&path, false, &CoordinatorSettings::default()).unwrap();
        assert_eq!(len, 0);
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_buffered_output_reaches_disk_on_finish() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let settings = CoordinatorSettings {
            immediate_flush: false,
            buffered_io: true,
            io_buffer_size: 4096,
        };

        let (mut target, _) = Target::open(&path, true, &settings).unwrap();
        target.write_str("buffered\n", false).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);

        target.finish(Some("-- end --\n")).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "buffered\n-- end --\n");
    }

    #[test]
    fn test_open_fails_when_parent_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        assert!(Target::open(&blocker.join("app.log"), true, &CoordinatorSettings::default()).is_err());
    }
}
