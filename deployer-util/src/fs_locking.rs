use std::{
    fs::{create_dir_all, File, OpenOptions},
    io::{self, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Advisory, exclusive lock on a path, backed by `flock`/`LockFileEx` through `fd-lock`.
///
/// The lock is taken on a sibling lock file so that the guarded file itself can be replaced
/// atomically while the lock is held. Locks are per open file description, so two
/// `PathLock`s on the same path exclude each other even inside a single process.
pub struct PathLock {
    path: PathBuf,
    lock: fd_lock::RwLock<File>,
}

impl PathLock {
    /// Opens (and creates if needed) the lock file at `path`. Does not take the lock.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<PathLock> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;
        Ok(Self {
            path,
            lock: fd_lock::RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Attempts to take the lock without blocking.
    ///
    /// Returns `Ok(None)` if another holder currently owns the lock. The lock is released when
    /// the returned guard is dropped.
    pub fn try_lock(&mut self) -> io::Result<Option<fd_lock::RwLockWriteGuard<'_, File>>> {
        match self.lock.try_write() {
            Ok(mut guard) => {
                // Record the holder for operators inspecting a stuck lock.
                guard.set_len(0)?;
                guard.seek(SeekFrom::Start(0))?;
                guard.write_all(std::process::id().to_string().as_bytes())?;
                Ok(Some(guard))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::PathLock;

    #[test]
    fn second_lock_on_same_path_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".locks").join("Arbiter.lock");
        let mut first = PathLock::open(&path).unwrap();
        let mut second = PathLock::open(&path).unwrap();

        let guard = first.try_lock().unwrap();
        assert!(guard.is_some());
        assert!(second.try_lock().unwrap().is_none());

        drop(guard);
        assert!(second.try_lock().unwrap().is_some());
    }

    #[test]
    fn lock_file_records_holder_pid() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = PathLock::open(dir.path().join("x.lock")).unwrap();
        let guard = lock.try_lock().unwrap().unwrap();
        drop(guard);
        let contents = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents, std::process::id().to_string());
    }
}
