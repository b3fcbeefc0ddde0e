//! Bare revision cache: fetch commits on demand and export their trees

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use git2::{AutotagOption, FetchOptions, ObjectType, Oid, Repository, Tree};

use crate::{Error, RemoteOptions, Result};

const HEADS_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";
const TAGS_REFSPEC: &str = "+refs/tags/*:refs/tags/*";

/// libgit2's `GIT_ENOTSUPPORTED`, returned by transports without shallow support.
const GIT_ENOTSUPPORTED: i32 = -39;

const MODE_EXECUTABLE: i32 = 0o100755;
const MODE_SYMLINK: i32 = 0o120000;

/// A bare repository kept between cycles so later fetches are incremental.
pub struct RevisionCache {
    repo: Repository,
    path: PathBuf,
}

impl RevisionCache {
    /// Open the cache at `path`, initialising an empty bare repository when
    /// none exists yet. A cache that exists but cannot be opened is discarded
    /// and rebuilt; later fetches repopulate it.
    pub fn open_or_init(path: &Path) -> Result<Self> {
        let repo = if path.exists() {
            match Repository::open_bare(path) {
                Ok(repo) => repo,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable revision cache");
                    fs::remove_dir_all(path).map_err(|e| Error::io(path, e))?;
                    Repository::init_bare(path)?
                }
            }
        } else {
            tracing::debug!(path = %path.display(), "Initialising revision cache");
            Repository::init_bare(path)?
        };

        Ok(Self {
            repo,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `oid` is a commit already present in the cache.
    pub fn contains(&self, oid: Oid) -> bool {
        self.repo.find_commit(oid).is_ok()
    }

    /// Make sure `oid` is in the cache, fetching from `url` if needed.
    ///
    /// Branches and tags are fetched first; commits that are not reachable
    /// from any advertised ref are then requested by id.
    pub fn ensure(&self, url: &str, oid: Oid, options: &RemoteOptions) -> Result<()> {
        if self.contains(oid) {
            tracing::debug!(revision = %oid, "Revision already cached");
            return Ok(());
        }

        self.fetch(url, &[HEADS_REFSPEC, TAGS_REFSPEC], options)?;

        if !self.contains(oid) {
            let by_id = oid.to_string();
            if let Err(e) = self.fetch(url, &[by_id.as_str()], options) {
                tracing::debug!(revision = %oid, error = %e, "Fetch by id failed");
            }
        }

        if self.contains(oid) {
            Ok(())
        } else {
            Err(Error::RevisionNotFound {
                url: url.to_string(),
                revision: oid.to_string(),
            })
        }
    }

    fn fetch(&self, url: &str, refspecs: &[&str], options: &RemoteOptions) -> Result<()> {
        match self.fetch_at_depth(url, refspecs, options, options.depth) {
            Err(Error::Git(e)) if options.depth.is_some() && e.raw_code() == GIT_ENOTSUPPORTED => {
                tracing::warn!(url, error = %e, "Shallow fetch unsupported, fetching full history");
                self.fetch_at_depth(url, refspecs, options, None)
            }
            other => other,
        }
    }

    fn fetch_at_depth(
        &self,
        url: &str,
        refspecs: &[&str],
        options: &RemoteOptions,
        depth: Option<u32>,
    ) -> Result<()> {
        let mut remote = self
            .repo
            .remote_anonymous(url)
            .map_err(|e| Error::unreachable(url, e))?;

        let started = Instant::now();
        let mut callbacks = options.callbacks();
        if let Some(timeout) = options.timeout {
            callbacks.transfer_progress(move |_| started.elapsed() < timeout);
            callbacks.sideband_progress(move |_| started.elapsed() < timeout);
        }

        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(callbacks)
            .proxy_options(options.proxy())
            .download_tags(AutotagOption::All);
        if let Some(depth) = depth {
            fetch_options.depth(i32::try_from(depth).unwrap_or(i32::MAX));
        }

        remote
            .fetch(refspecs, Some(&mut fetch_options), None)
            .map_err(|e| match options.timeout {
                Some(timeout) if started.elapsed() >= timeout => Error::Timeout {
                    operation: format!("fetch from {url}"),
                    timeout,
                },
                _ if e.raw_code() == GIT_ENOTSUPPORTED => Error::Git(e),
                _ => Error::FetchFailed {
                    url: url.to_string(),
                    message: e.message().to_string(),
                },
            })?;

        tracing::debug!(url, ?depth, elapsed_ms = started.elapsed().as_millis() as u64, "Fetched");
        Ok(())
    }

    /// Write the tree of commit `oid` into `target`, which must exist.
    ///
    /// Regular files, executable files and symbolic links are reproduced;
    /// submodules become empty directories.
    pub fn export(&self, oid: Oid, target: &Path) -> Result<()> {
        let tree = self.repo.find_commit(oid)?.tree()?;
        self.write_tree(&tree, target)
    }

    fn write_tree(&self, tree: &Tree<'_>, dir: &Path) -> Result<()> {
        for entry in tree.iter() {
            let name = entry_name(entry.name_bytes())?;
            let path = dir.join(&name);

            match entry.kind() {
                Some(ObjectType::Tree) => {
                    fs::create_dir(&path).map_err(|e| Error::io(&path, e))?;
                    let subtree = self.repo.find_tree(entry.id())?;
                    self.write_tree(&subtree, &path)?;
                }
                Some(ObjectType::Blob) => {
                    let blob = self.repo.find_blob(entry.id())?;
                    write_blob(&path, blob.content(), entry.filemode())?;
                }
                Some(ObjectType::Commit) => {
                    fs::create_dir(&path).map_err(|e| Error::io(&path, e))?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn entry_name(raw: &[u8]) -> Result<PathBuf> {
    let invalid = || Error::InvalidTreeEntry {
        name: String::from_utf8_lossy(raw).into_owned(),
    };

    if raw.is_empty() || raw == b"." || raw == b".." || raw.contains(&b'/') || raw.contains(&0) {
        return Err(invalid());
    }

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Ok(PathBuf::from(std::ffi::OsStr::from_bytes(raw)))
    }

    #[cfg(not(unix))]
    {
        std::str::from_utf8(raw)
            .map(PathBuf::from)
            .map_err(|_| invalid())
    }
}

fn write_blob(path: &Path, content: &[u8], mode: i32) -> Result<()> {
    if mode == MODE_SYMLINK {
        return write_symlink(path, content);
    }

    fs::write(path, content).map_err(|e| Error::io(path, e))?;

    #[cfg(unix)]
    if mode == MODE_EXECUTABLE {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|e| Error::io(path, e))?;
    }

    Ok(())
}

#[cfg(unix)]
fn write_symlink(path: &Path, target: &[u8]) -> Result<()> {
    use std::os::unix::ffi::OsStrExt;
    std::os::unix::fs::symlink(std::ffi::OsStr::from_bytes(target), path)
        .map_err(|e| Error::io(path, e))
}

// Without unix symlinks the link is materialized as a file holding its target,
// matching git's core.symlinks=false behaviour.
#[cfg(not(unix))]
fn write_symlink(path: &Path, target: &[u8]) -> Result<()> {
    fs::write(path, target).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_or_init_creates_bare_repo() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.git");

        let cache = RevisionCache::open_or_init(&path).unwrap();
        assert!(cache.repo.is_bare());

        // Re-opening reuses the same repository.
        let again = RevisionCache::open_or_init(&path).unwrap();
        assert_eq!(again.path(), path.as_path());
    }

    #[test]
    fn test_open_or_init_rebuilds_unreadable_cache() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.git");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("HEAD"), "garbage").unwrap();

        let cache = RevisionCache::open_or_init(&path).unwrap();
        assert!(cache.repo.is_bare());
        assert!(RevisionCache::open_or_init(&path).is_ok());
    }

    #[test]
    fn test_entry_name_rejects_traversal() {
        assert!(entry_name(b"..").is_err());
        assert!(entry_name(b"a/b").is_err());
        assert!(entry_name(b"").is_err());
        assert_eq!(entry_name(b"src").unwrap(), PathBuf::from("src"));
    }
}
