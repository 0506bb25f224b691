use anyhow::Result;
use std::io::Write;
use std::path::Path;

use super::{EntryRow, Feed};
use crate::output::{OutputMode, render_item};

/// Execute `livefeed latest`: the most recent record of any kind.
///
/// # Errors
///
/// Returns an error if the feed cannot be opened or read.
pub fn run_latest(output: OutputMode, project_root: &Path) -> Result<()> {
    let feed = Feed::open(project_root)?;
    match feed.service.get_latest()? {
        Some(entry) => render_item(&EntryRow::from(&entry), output)?,
        None if output.is_json() => writeln!(std::io::stdout(), "null")?,
        None => writeln!(std::io::stdout(), "(feed is empty)")?,
    }
    Ok(())
}
