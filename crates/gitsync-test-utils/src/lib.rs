//! Shared test utilities for the git-sync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: upstream repositories built with the `git` CLI
//! - [`http`]: a local endpoint that records notification requests

pub mod git;
pub mod http;

pub use git::Upstream;
pub use http::{RecordedRequest, RecordingEndpoint};
