use anyhow::Result;
use clap::Args;
use livefeed_core::{EntryId, Timestamp};
use std::path::Path;

use super::{EntryRow, Feed, parse_timestamp};
use crate::output::{OutputMode, render_item};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Id of the entry to delete.
    pub id: EntryId,

    /// Timestamp (epoch seconds or RFC 3339); defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<Timestamp>,
}

/// Execute `livefeed delete`: append a delete record for a live entry.
///
/// # Errors
///
/// Returns an error if the target is not live or the timestamp predates it.
pub fn run_delete(args: &DeleteArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let feed = Feed::open(project_root)?;
    let entry = feed.publisher().publish_delete(args.id, args.at)?;
    tracing::info!(id = entry.id, target = args.id, "published delete");
    render_item(&EntryRow::from(&entry), output)?;
    Ok(())
}
