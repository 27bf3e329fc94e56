use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use kbchat_core::error::{codes, AppError};

/// Exclusive marker file held for the duration of an index build.
/// A leftover file from a crashed build has to be removed by hand.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    pub fn acquire(path: &Path) -> Result<Self, AppError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AppError::new(
                    codes::INDEX_BUILD_IN_PROGRESS,
                    "Another knowledge base build is in progress",
                )
                .with_details(format!(
                    "lock={}; delete it if no build is running",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(
                    AppError::new(codes::INDEX_BUILD_FAILED, "Failed to create build lock")
                        .with_details(format!("path={}; err={}", path.display(), e)),
                );
            }
        };
        // Best effort; the lock is the file's existence, not its content.
        let _ = writeln!(file, "pid={}", std::process::id());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release build lock");
        }
    }
}
