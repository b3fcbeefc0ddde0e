//! Revision identifiers and ref selectors

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Length of a hexadecimal SHA-1 commit id.
const HEX_LEN: usize = 40;

/// Identifier of an immutable content snapshot: a lowercase hex commit id.
///
/// Two ids are equal iff they name the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref();
        if id.len() != HEX_LEN || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::config(format!("'{id}' is not a {HEX_LEN}-digit commit id")));
        }
        Ok(Self(id.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl From<gitsync_git::Oid> for RevisionId {
    fn from(oid: gitsync_git::Oid) -> Self {
        Self(oid.to_string())
    }
}

impl TryFrom<String> for RevisionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl FromStr for RevisionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A branch, tag, full ref name or fixed commit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefSelector(String);

impl RefSelector {
    pub fn new(selector: impl Into<String>) -> Result<Self> {
        let selector = selector.into().trim().to_string();
        if selector.is_empty() {
            return Err(Error::config("ref selector must not be empty"));
        }
        Ok(Self(selector))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The pinned revision, if this selector is a full commit id.
    pub fn fixed_revision(&self) -> Option<RevisionId> {
        RevisionId::new(&self.0).ok()
    }
}

impl Default for RefSelector {
    fn default() -> Self {
        Self(gitsync_git::DEFAULT_SELECTOR.to_string())
    }
}

impl fmt::Display for RefSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
