use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Exclusive hold on a state file, taken through an advisory lock on
/// `<state>.lock` next to it.
///
/// Two holders never coexist, whether in one process or two, so a loaded
/// snapshot cannot be overwritten by a writer that loaded before it. The
/// lock is released on drop, or by the OS if the process dies.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Take the lock for `state_path` without waiting.
    ///
    /// A lock already held elsewhere is [`StoreError::Unavailable`], so
    /// callers may retry once the other holder is gone.
    pub fn acquire(state_path: &Path) -> StoreResult<Self> {
        let path = lock_path(state_path);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "state lock acquired");
                Ok(Self { file, path })
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(StoreError::Unavailable(format!(
                    "{} is held by another instance",
                    path.display()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), error = %e, "state lock release failed");
        }
    }
}

fn lock_path(state_path: &Path) -> PathBuf {
    let mut name = OsString::from(state_path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}
