use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::core::error::{Error, ErrorKind, Result};

/// Single writer guarantee for a bucket directory.
///
/// Held for the lifetime of the store; a second process opening the same
/// directory fails instead of silently racing the split protocol.
pub struct FileLock {
    pub file: File,
}

impl FileLock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        let lock_path = dir.join(".lock");

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;

        // Platform-specific locking
        #[cfg(unix)]
        {
            use libc::{flock, LOCK_EX, LOCK_NB};
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            unsafe {
                if flock(fd, LOCK_EX | LOCK_NB) != 0 {
                    return Err(Error {
                        kind: ErrorKind::Io,
                        context: format!(
                            "failed to acquire exclusive lock on {}",
                            lock_path.display()
                        ),
                    });
                }
            }
        }

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use libc::{flock, LOCK_UN};
            use std::os::unix::io::AsRawFd;

            let fd = self.file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}
