//! Git toolchain for git-sync
//!
//! The two primitives the sync engine needs from version control:
//!
//! - [`resolve_ref`]: turn a ref selector into a commit id using only the
//!   remote's ref advertisement (no objects are downloaded)
//! - [`RevisionCache`]: a bare repository that fetches a commit on demand
//!   and exports its tree into a directory

pub mod cache;
pub mod error;
pub mod options;
pub mod remote;

pub use cache::RevisionCache;
pub use git2::Oid;
pub use error::{Error, Result};
pub use options::{Credentials, RemoteOptions, set_network_timeout};
pub use remote::{DEFAULT_SELECTOR, RemoteRef, list_remote, parse_fixed_revision, resolve_ref, select_ref};
