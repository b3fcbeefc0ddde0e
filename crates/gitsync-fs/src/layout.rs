//! Mirror layout: where a destination's revisions, staging areas and lock live
//!
//! For a destination `<parent>/<name>` everything git-sync owns sits in the
//! sibling store `<parent>/.<name>.gitsync/`:
//!
//! ```text
//! <parent>/
//!   <name> -> .<name>.gitsync/revisions/<revision>
//!   .<name>.gitsync/
//!     .lock
//!     cache.git/
//!     revisions/<revision>/
//!     staging-<uuid>/
//! ```

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{Error, Result};

const REVISIONS_DIR: &str = "revisions";
const CACHE_DIR: &str = "cache.git";
const LOCK_FILE: &str = ".lock";
pub(crate) const STAGING_PREFIX: &str = "staging-";

/// What currently occupies the destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestState {
    /// Nothing exists at the destination.
    Missing,
    /// An empty directory; safe to replace.
    Empty,
    /// A link into the store pointing at an exported revision.
    Managed { revision: String },
    /// A link into the store whose revision directory has disappeared.
    Stale,
    /// Anything else. Never touched.
    Foreign,
}

impl DestState {
    /// Whether a materialization may replace what is at the destination.
    pub fn is_replaceable(&self) -> bool {
        !matches!(self, DestState::Foreign)
    }
}

/// Paths derived from a single destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorLayout {
    dest: PathBuf,
    parent: PathBuf,
    store_name: OsString,
}

impl MirrorLayout {
    /// Build the layout for `dest`. Relative destinations are anchored at the
    /// current working directory.
    pub fn new(dest: impl AsRef<Path>) -> Result<Self> {
        let dest = dest.as_ref();
        let absolute = std::path::absolute(dest).map_err(|e| Error::io(dest, e))?;

        let Some(name) = absolute.file_name().map(|n| n.to_os_string()) else {
            return Err(Error::InvalidDestination {
                path: absolute,
                message: "destination must end in a directory name".to_string(),
            });
        };
        let Some(parent) = absolute.parent().map(Path::to_path_buf) else {
            return Err(Error::InvalidDestination {
                path: absolute,
                message: "destination has no parent directory".to_string(),
            });
        };

        let mut store_name = OsString::from(".");
        store_name.push(&name);
        store_name.push(".gitsync");

        Ok(Self {
            dest: absolute,
            parent,
            store_name,
        })
    }

    /// The destination path readers consume.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Directory containing the destination (and the store).
    pub fn parent(&self) -> &Path {
        &self.parent
    }

    /// Root of the engine-owned store.
    pub fn store(&self) -> PathBuf {
        self.parent.join(&self.store_name)
    }

    /// Bare repository reused between fetches.
    pub fn cache_dir(&self) -> PathBuf {
        self.store().join(CACHE_DIR)
    }

    pub fn revisions_dir(&self) -> PathBuf {
        self.store().join(REVISIONS_DIR)
    }

    pub fn revision_dir(&self, revision: &str) -> PathBuf {
        self.revisions_dir().join(revision)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.store().join(LOCK_FILE)
    }

    /// Link target for `revision`, relative to the destination's parent so
    /// that the mirror survives being mounted elsewhere.
    pub fn link_target(&self, revision: &str) -> PathBuf {
        Path::new(&self.store_name)
            .join(REVISIONS_DIR)
            .join(revision)
    }

    /// A fresh, not yet created, staging directory inside the store.
    pub fn new_staging_dir(&self) -> PathBuf {
        self.store()
            .join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4().simple()))
    }

    /// Create the store and its revisions directory if needed.
    pub fn ensure_store(&self) -> Result<()> {
        let revisions = self.revisions_dir();
        fs::create_dir_all(&revisions).map_err(|e| Error::io(&revisions, e))
    }

    /// Classify whatever is at the destination without modifying it.
    pub fn inspect(&self) -> Result<DestState> {
        let meta = match fs::symlink_metadata(&self.dest) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DestState::Missing),
            Err(e) => return Err(Error::io(&self.dest, e)),
        };

        if meta.file_type().is_symlink() {
            let target = fs::read_link(&self.dest).map_err(|e| Error::io(&self.dest, e))?;
            return Ok(self.classify_link(&target));
        }

        if meta.is_dir() {
            let mut entries = fs::read_dir(&self.dest).map_err(|e| Error::io(&self.dest, e))?;
            if entries.next().is_none() {
                return Ok(DestState::Empty);
            }
        }

        Ok(DestState::Foreign)
    }

    /// The revision the destination currently points at, if it is managed.
    pub fn current_revision(&self) -> Result<Option<String>> {
        match self.inspect()? {
            DestState::Managed { revision } => Ok(Some(revision)),
            _ => Ok(None),
        }
    }

    fn classify_link(&self, target: &Path) -> DestState {
        let resolved = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.parent.join(target)
        };

        let revisions = self.revisions_dir();
        if resolved.parent() != Some(revisions.as_path()) {
            return DestState::Foreign;
        }

        match resolved.file_name().and_then(|n| n.to_str()) {
            Some(revision) if resolved.is_dir() => DestState::Managed {
                revision: revision.to_string(),
            },
            Some(_) => DestState::Stale,
            None => DestState::Foreign,
        }
    }
}
