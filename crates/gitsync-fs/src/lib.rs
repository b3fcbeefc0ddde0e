//! Filesystem layer for git-sync
//!
//! Owns the on-disk shape of a mirrored destination: the sibling store
//! holding exported revisions, the staging area, the advisory lock and the
//! symbolic link that is swapped atomically on every update.

pub mod error;
pub mod io;
pub mod layout;

pub use error::{Error, Result};
pub use io::{StoreLock, atomic_symlink_swap};
pub use layout::{DestState, MirrorLayout};
