use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("point of no return already marked after backup {seq}")]
    PonrAlreadyMarked { seq: u64 },
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "another run holds the lock at {}{}",
        .path.display(),
        holder_suffix(.pid)
    )]
    AlreadyHeld { path: PathBuf, pid: Option<u32> },
    #[error("failed to use lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn holder_suffix(pid: &Option<u32>) -> String {
    pid.map(|pid| format!(" (pid {pid})")).unwrap_or_default()
}
