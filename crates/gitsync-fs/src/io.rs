//! Atomic installation of exported revisions with store locking

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use uuid::Uuid;

use crate::layout::STAGING_PREFIX;
use crate::{DestState, Error, MirrorLayout, Result};

/// Exclusive advisory lock on a store, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Try to take the lock without blocking.
    ///
    /// Fails with [`Error::LockFailed`] when another process holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        file.try_lock_exclusive()
            .map_err(|_| Error::LockFailed {
                path: path.to_path_buf(),
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Point `link` at `target` by renaming a freshly created link over it.
///
/// Readers resolving `link` see either the old or the new target, never a
/// missing path (unless `link` did not exist before).
pub fn atomic_symlink_swap(link: &Path, target: &Path) -> Result<()> {
    let (Some(parent), Some(name)) = (link.parent(), link.file_name()) else {
        return Err(Error::InvalidDestination {
            path: link.to_path_buf(),
            message: "link has no parent directory".to_string(),
        });
    };

    let temp_name = format!(
        ".{}.{}.link",
        name.to_string_lossy(),
        Uuid::new_v4().simple()
    );
    let temp_link = parent.join(temp_name);

    symlink_dir(target, &temp_link).map_err(|e| Error::io(&temp_link, e))?;

    if let Err(e) = fs::rename(&temp_link, link) {
        let _ = fs::remove_file(&temp_link);
        return Err(Error::io(link, e));
    }

    Ok(())
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

impl MirrorLayout {
    /// Materialize `revision` at the destination.
    ///
    /// `populate` fills a private staging directory. Only after it succeeds is
    /// the staging directory moved into the store and the destination link
    /// swapped. Foreign content at the destination is rejected with
    /// [`Error::DestinationConflict`] before anything is created on disk.
    pub fn install<E, F>(&self, revision: &str, populate: F) -> std::result::Result<(), E>
    where
        F: FnOnce(&Path) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        self.reject_foreign()?;
        self.ensure_store()?;
        let _lock = StoreLock::acquire(&self.lock_path())?;

        // The destination may have changed while we waited for the store.
        let state = self.reject_foreign()?;
        if state == (DestState::Managed { revision: revision.to_string() }) {
            tracing::debug!(revision, dest = %self.dest().display(), "Revision already installed");
            return Ok(());
        }

        let target = self.revision_dir(revision);
        if !target.is_dir() {
            let staging = self.new_staging_dir();
            fs::create_dir(&staging).map_err(|e| Error::io(&staging, e))?;

            if let Err(e) = populate(&staging) {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    tracing::warn!(
                        staging = %staging.display(),
                        error = %cleanup,
                        "Failed to remove staging directory"
                    );
                }
                return Err(e);
            }

            fs::rename(&staging, &target).map_err(|e| Error::io(&target, e))?;
        }

        if state == DestState::Empty {
            fs::remove_dir(self.dest()).map_err(|e| Error::io(self.dest(), e))?;
        }

        atomic_symlink_swap(self.dest(), &self.link_target(revision))?;
        tracing::debug!(revision, dest = %self.dest().display(), "Destination swapped");

        match self.prune(revision) {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Pruned old revisions"),
            Err(e) => tracing::warn!(error = %e, "Failed to prune store"),
        }

        Ok(())
    }

    /// Remove exported revisions other than `keep` and leftover staging
    /// directories. Returns how many directories were removed.
    ///
    /// Callers must hold the store lock.
    pub fn prune(&self, keep: &str) -> Result<usize> {
        let mut removed = 0;

        let revisions = self.revisions_dir();
        for entry in fs::read_dir(&revisions).map_err(|e| Error::io(&revisions, e))? {
            let entry = entry.map_err(|e| Error::io(&revisions, e))?;
            if entry.file_name() == keep {
                continue;
            }
            let path = entry.path();
            fs::remove_dir_all(&path).map_err(|e| Error::io(&path, e))?;
            removed += 1;
        }

        let store = self.store();
        for entry in fs::read_dir(&store).map_err(|e| Error::io(&store, e))? {
            let entry = entry.map_err(|e| Error::io(&store, e))?;
            let is_staging = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(STAGING_PREFIX));
            if !is_staging {
                continue;
            }
            let path = entry.path();
            fs::remove_dir_all(&path).map_err(|e| Error::io(&path, e))?;
            removed += 1;
        }

        Ok(removed)
    }

    fn reject_foreign(&self) -> Result<DestState> {
        let state = self.inspect()?;
        if !state.is_replaceable() {
            return Err(Error::DestinationConflict {
                path: self.dest().to_path_buf(),
            });
        }
        Ok(state)
    }
}
