//! Remote ref resolution without touching local state
//!
//! Equivalent to `git ls-remote`: connect, read the ref advertisement,
//! disconnect. Safe to call on every poll.

use git2::{Direction, Oid, Remote};

use crate::{Error, RemoteOptions, Result};

/// Selector used when none is configured: the remote's default branch.
pub const DEFAULT_SELECTOR: &str = "HEAD";

/// One advertised ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub name: String,
    pub oid: Oid,
}

/// List the refs advertised by `url`.
pub fn list_remote(url: &str, options: &RemoteOptions) -> Result<Vec<RemoteRef>> {
    let mut remote = Remote::create_detached(url).map_err(|e| Error::unreachable(url, e))?;

    let mut connection = remote
        .connect_auth(Direction::Fetch, Some(options.callbacks()), Some(options.proxy()))
        .map_err(|e| Error::unreachable(url, e))?;

    let refs = connection
        .remote()
        .list()
        .map_err(|e| Error::unreachable(url, e))?
        .iter()
        .map(|head| RemoteRef {
            name: head.name().to_string(),
            oid: head.oid(),
        })
        .collect();

    Ok(refs)
}

/// Resolve `selector` on `url` to a commit id.
///
/// A full hexadecimal commit id resolves to itself without contacting the
/// remote. Anything else must match an advertised ref (see [`select_ref`]).
pub fn resolve_ref(url: &str, selector: &str, options: &RemoteOptions) -> Result<Oid> {
    if let Some(oid) = parse_fixed_revision(selector) {
        return Ok(oid);
    }

    let refs = list_remote(url, options)?;
    tracing::debug!(url, refs = refs.len(), "Listed remote refs");

    select_ref(&refs, selector).ok_or_else(|| Error::RefNotFound {
        url: url.to_string(),
        selector: selector.to_string(),
    })
}

/// Parse `selector` as a full commit id.
pub fn parse_fixed_revision(selector: &str) -> Option<Oid> {
    if selector.len() != 40 || !selector.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Oid::from_str(selector).ok()
}

/// Pick the commit for `selector` among advertised refs.
///
/// Tries the selector verbatim, then as a branch, then as a tag. Peeled
/// entries (`<ref>^{}`) win over the ref itself so annotated tags resolve to
/// the commit they point at.
pub fn select_ref(refs: &[RemoteRef], selector: &str) -> Option<Oid> {
    let candidates = [
        selector.to_string(),
        format!("refs/heads/{selector}"),
        format!("refs/tags/{selector}"),
    ];

    candidates.iter().find_map(|name| {
        let peeled = format!("{name}^{{}}");
        refs.iter()
            .find(|r| r.name == peeled)
            .or_else(|| refs.iter().find(|r| &r.name == name))
            .map(|r| r.oid)
    })
}
