//! Filesystem access used by the loaders.
//!
//! Every file the cache manager and readers touch goes through a
//! [`Storage`], so tests can observe or fail individual opens.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::Result;

/// Filesystem operations used by the database loaders.
pub trait Storage: Send + Sync {
    /// Whether a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Open `path` for reading.
    fn open(&self, path: &Path) -> io::Result<File>;

    /// Create (or truncate) `path` for reading and writing.
    fn create(&self, path: &Path) -> io::Result<File>;

    /// Atomically replace `to` with `from`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove `path`.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// The local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn open(&self, path: &Path) -> io::Result<File> {
        File::open(path)
    }

    fn create(&self, path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Path for the temporary file written before an atomic rename to `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `path` through a temporary file and rename it into place.
///
/// On failure the temporary file is removed and any existing file at
/// `path` is left untouched.
pub fn write_atomically<T, F>(storage: &dyn Storage, path: &Path, write: F) -> Result<T>
where
    F: FnOnce(File) -> Result<(T, File)>,
{
    let temp = temp_path(path);
    let result = storage
        .create(&temp)
        .map_err(Into::into)
        .and_then(write)
        .and_then(|(value, file)| {
            file.sync_all()?;
            drop(file);
            storage.rename(&temp, path)?;
            Ok(value)
        });

    if result.is_err() {
        let _ = storage.remove(&temp);
    }
    result
}
