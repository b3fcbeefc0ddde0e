//! Materializing revisions at the destination

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gitsync_fs::MirrorLayout;
use gitsync_git::{Oid, RemoteOptions, RevisionCache};

use crate::revision::RevisionId;
use crate::{Error, Result};

/// Brings a destination to exactly the content of a revision.
///
/// Readers of the destination must only ever see a complete revision.
#[async_trait]
pub trait Materializer: Send + Sync {
    /// Fails with [`Error::DestinationConflict`] if `dest` holds content the
    /// materializer did not produce, [`Error::MaterializeFailed`] otherwise.
    async fn materialize(&self, remote: &str, revision: &RevisionId, dest: &Path) -> Result<()>;
}

/// Materializer exporting commits from a bare cache into the mirror layout.
///
/// Transfers honour the timeout in its [`RemoteOptions`]; once started, a
/// materialization always runs to completion or failure.
#[derive(Debug, Clone, Default)]
pub struct GitMaterializer {
    options: RemoteOptions,
}

impl GitMaterializer {
    pub fn new(options: RemoteOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Materializer for GitMaterializer {
    async fn materialize(&self, remote: &str, revision: &RevisionId, dest: &Path) -> Result<()> {
        let url = remote.to_string();
        let rev = revision.clone();
        let dest: PathBuf = dest.to_path_buf();
        let options = self.options.clone();

        tokio::task::spawn_blocking(move || install(&url, &rev, &dest, &options))
            .await
            .map_err(|e| Error::MaterializeFailed {
                revision: revision.to_string(),
                message: format!("materializer task failed: {e}"),
            })?
    }
}

fn install(url: &str, revision: &RevisionId, dest: &Path, options: &RemoteOptions) -> Result<()> {
    let layout = MirrorLayout::new(dest)?;
    let oid = Oid::from_str(revision.as_str())
        .map_err(|e| Error::materialize(revision, gitsync_git::Error::from(e)))?;

    layout
        .install(revision.as_str(), |staging| -> Result<()> {
            let cache = RevisionCache::open_or_init(&layout.cache_dir())?;
            cache.ensure(url, oid, options)?;
            cache.export(oid, staging)?;
            tracing::debug!(revision = %revision, staging = %staging.display(), "Exported tree");
            Ok(())
        })
        .map_err(|e| Error::materialize(revision, e))
}
