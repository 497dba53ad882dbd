//! File locking for the single-writer discipline on the index.
//!
//! Uses flock() for advisory locking on the application directory. The
//! index command holds the lock for the whole build; search and scan
//! commands read the last-persisted snapshot without locking.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Lock file name placed in the base directory
const LOCK_FILE_NAME: &str = "snapscout.lock";

/// A held file lock that releases on drop
pub struct FileLock {
    #[allow(dead_code)]
    file: File,
}

impl FileLock {
    /// Attempt to acquire an exclusive lock on the application directory.
    /// Returns `Ok(FileLock)` if acquired, or an error if locked by another
    /// process.
    pub fn try_acquire(base_path: &Path) -> io::Result<Self> {
        let lock_path = base_path.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        Self::try_lock_exclusive(&file)?;

        Ok(FileLock { file })
    }

    #[cfg(unix)]
    fn try_lock_exclusive(file: &File) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock
                || err.raw_os_error() == Some(libc::EWOULDBLOCK)
                || err.raw_os_error() == Some(libc::EAGAIN)
            {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "index is locked by another snapscout process",
                ));
            }
            return Err(err);
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn try_lock_exclusive(_file: &File) -> io::Result<()> {
        // On non-Unix platforms, we don't implement locking (yet)
        // This allows the code to compile but provides no protection
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for FileLock {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        // Release the lock - ignore errors on drop
        unsafe { libc::flock(fd, libc::LOCK_UN) };
    }
}
