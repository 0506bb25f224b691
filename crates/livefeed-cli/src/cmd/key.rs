use anyhow::Result;
use clap::Args;
use livefeed_core::{EntryId, Timestamp};
use std::path::Path;

use super::{EntryRow, Feed, parse_timestamp};
use crate::output::{OutputMode, render_item};

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Id of the entry to flag.
    pub id: EntryId,

    /// Clear the flag instead of setting it.
    #[arg(long)]
    pub off: bool,

    /// Timestamp (epoch seconds or RFC 3339); defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<Timestamp>,
}

/// Execute `livefeed key`: flag or unflag an entry as a key event.
///
/// # Errors
///
/// Returns an error if the target is not live.
pub fn run_key(args: &KeyArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let feed = Feed::open(project_root)?;
    let entry = feed.publisher().set_key_event(args.id, !args.off, args.at)?;
    tracing::info!(id = entry.id, target = args.id, key_event = !args.off, "updated key flag");
    render_item(&EntryRow::from(&entry), output)?;
    Ok(())
}
