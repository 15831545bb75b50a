//! Query command implementation for plaque CLI.
//!
//! Runs a notebook and prints one of its JSON projections.

use std::path::Path;

use plaque_core::session::SCHEME;
use plaque_core::{FileSource, NotebookSession, Resource, SessionConfig};

/// Execute the query command.
pub fn execute(notebook_path: &str, resource: &str, list: bool, config: SessionConfig) -> anyhow::Result<()> {
    let path = Path::new(notebook_path);
    if !path.exists() {
        anyhow::bail!("Notebook not found: {}", notebook_path);
    }

    let mut session = NotebookSession::new(config).with_source(Box::new(FileSource::new(path)));
    // Cell errors are part of the projections, not a failure of the query.
    session.reload()?;

    if list {
        for resource in Resource::all(session.notebook().len()) {
            println!("{}{}", SCHEME, resource);
        }
        return Ok(());
    }

    let value = session.read_path(resource)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
