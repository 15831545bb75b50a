//! Notebook sessions and their read-only projections.
//!
//! This module provides:
//! - `NotebookSession`, the single mutation entry point
//! - Source providers for reloading from disk
//! - JSON projections addressed by resource path

mod config;
mod notebook;
mod resources;
mod source;

pub use config::SessionConfig;
pub use notebook::{NotebookSession, ParseFailure, SessionId};
pub use resources::{Resource, SCHEME};
pub use source::{FileSource, SourceProvider};
