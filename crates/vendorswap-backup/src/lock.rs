use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info};

use crate::error::LockError;

/// Host-wide exclusive guard for a conversion run.
///
/// Uses an advisory `flock` on the lock file, so the kernel drops it when the
/// process dies. The holder's pid is written into the file for diagnostics.
#[derive(Debug)]
pub struct ProcessLock {
    file: File,
    path: PathBuf,
}

impl ProcessLock {
    /// Take the lock without blocking.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let io_error = |source: io::Error| LockError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        // Opened without truncation: the pid of a current holder must survive
        // a failed attempt.
        let mut file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error)?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                let pid = Self::holder_pid(&path);
                debug!("lock {} already held", path.display());
                return Err(LockError::AlreadyHeld {
                    path: path.clone(),
                    pid,
                });
            }
            Err(err) => return Err(io_error(err)),
        }

        file.set_len(0).map_err(io_error)?;
        file.seek(SeekFrom::Start(0)).map_err(io_error)?;
        writeln!(file, "{}", std::process::id()).map_err(io_error)?;
        file.flush().map_err(io_error)?;

        info!("acquired run lock at {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn holder_pid(path: impl AsRef<Path>) -> Option<u32> {
        let mut raw = String::new();
        File::open(path.as_ref())
            .and_then(|mut file| file.read_to_string(&mut raw))
            .ok()?;
        raw.trim().parse().ok()
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!("failed to release lock {}: {err}", self.path.display());
        } else {
            debug!("released run lock at {}", self.path.display());
        }
    }
}
