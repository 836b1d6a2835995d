//! General-purpose file store backend.
//!
//! One file per record inside a dedicated directory, with atomic
//! write-to-temp-then-rename semantics so a crash mid-write leaves either
//! the old value or the new value, never a torn file. No size ceiling and
//! no encryption at rest; hybrid mode only ever stores ciphertext envelopes
//! here.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{SessionResult, SessionStoreError};

use super::StorageBackend;

/// File-per-record backend for the general-purpose store.
pub struct FileBackend {
    directory: PathBuf,
}

impl FileBackend {
    /// Creates a backend rooted at `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(directory: P) -> SessionResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)
            .map_err(|err| SessionStoreError::FileStore(format!("create directory: {err}")))?;
        Ok(Self { directory })
    }

    fn record_path(&self, record: &str) -> PathBuf {
        self.directory.join(record)
    }
}

impl StorageBackend for FileBackend {
    fn label(&self) -> &'static str {
        "file-store"
    }

    fn get(&self, record: &str) -> SessionResult<Option<String>> {
        match fs::read(self.record_path(record)) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|err| SessionStoreError::FileStore(format!("read {record}: {err}"))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SessionStoreError::FileStore(format!("read {record}: {err}"))),
        }
    }

    fn set(&self, record: &str, value: &str) -> SessionResult<()> {
        let target = self.record_path(record);
        let tmp = self.directory.join(format!("{record}.tmp"));

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|err| SessionStoreError::FileStore(format!("open temp for {record}: {err}")))?;
        file.write_all(value.as_bytes())
            .map_err(|err| SessionStoreError::FileStore(format!("write {record}: {err}")))?;
        file.sync_all()
            .map_err(|err| SessionStoreError::FileStore(format!("sync {record}: {err}")))?;
        drop(file);

        fs::rename(&tmp, &target)
            .map_err(|err| SessionStoreError::FileStore(format!("rename {record}: {err}")))?;
        sync_directory(&self.directory);
        Ok(())
    }

    fn remove(&self, record: &str) -> SessionResult<()> {
        match fs::remove_file(self.record_path(record)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SessionStoreError::FileStore(format!("delete {record}: {err}"))),
        }
    }
}

/// Syncs the directory entry after a rename so the new name is durable.
/// Failure here is not worth failing the write over.
fn sync_directory(directory: &Path) {
    #[cfg(unix)]
    {
        if let Ok(dir) = fs::File::open(directory) {
            let _ = dir.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = directory;
}
