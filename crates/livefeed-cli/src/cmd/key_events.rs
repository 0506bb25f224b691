use anyhow::Result;
use clap::Args;
use std::path::Path;

use super::{Feed, rows};
use crate::output::{OutputMode, render_list};

#[derive(Args, Debug)]
pub struct KeyEventsArgs {
    /// Maximum number of key events to print.
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Execute `livefeed key-events`: live key events, newest first.
///
/// # Errors
///
/// Returns an error if the feed cannot be opened or read.
pub fn run_key_events(args: &KeyEventsArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let feed = Feed::open(project_root)?;
    let mut events = feed.service.get_all_key_events()?;
    if let Some(limit) = args.limit {
        events.truncate(limit);
    }
    render_list(&rows(&events), output)?;
    Ok(())
}
