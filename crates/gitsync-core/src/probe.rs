//! Remote revision probing

use async_trait::async_trait;
use gitsync_git::RemoteOptions;

use crate::revision::{RefSelector, RevisionId};
use crate::{Error, Result};

/// Resolves a ref selector on a remote without touching local state.
#[async_trait]
pub trait RevisionProbe: Send + Sync {
    /// Fails with [`Error::RemoteUnreachable`] when the remote cannot be
    /// reached and [`Error::RefNotFound`] when nothing matches `selector`.
    async fn resolve(&self, remote: &str, selector: &RefSelector) -> Result<RevisionId>;
}

/// Probe backed by the remote's ref advertisement.
#[derive(Debug, Clone, Default)]
pub struct GitRevisionProbe {
    options: RemoteOptions,
}

impl GitRevisionProbe {
    pub fn new(options: RemoteOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl RevisionProbe for GitRevisionProbe {
    async fn resolve(&self, remote: &str, selector: &RefSelector) -> Result<RevisionId> {
        let url = remote.to_string();
        let wanted = selector.as_str().to_string();
        let options = self.options.clone();

        let oid = tokio::task::spawn_blocking(move || gitsync_git::resolve_ref(&url, &wanted, &options))
            .await
            .map_err(|e| Error::RemoteUnreachable {
                url: remote.to_string(),
                message: format!("resolver task failed: {e}"),
            })??;

        Ok(RevisionId::from(oid))
    }
}
