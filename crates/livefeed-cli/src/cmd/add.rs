use anyhow::Result;
use clap::Args;
use livefeed_core::Timestamp;
use livefeed_core::publish::Draft;
use std::path::Path;

use super::{EntryRow, Feed, parse_timestamp};
use crate::output::{OutputMode, render_item};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Entry content (HTML).
    pub content: String,

    /// Flag the entry as a key event.
    #[arg(long)]
    pub key_event: bool,

    #[arg(long)]
    pub author: Option<String>,

    /// Timestamp (epoch seconds or RFC 3339); defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<Timestamp>,
}

/// Execute `livefeed add`: publish a new entry.
///
/// # Errors
///
/// Returns an error if the feed is not initialized, the content is empty or
/// the store rejects the insert.
pub fn run_add(args: &AddArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let feed = Feed::open(project_root)?;
    let mut draft = Draft::new(args.content.clone()).key_event(args.key_event);
    if let Some(ref author) = args.author {
        draft = draft.author(author.clone());
    }
    if let Some(ts) = args.at {
        draft = draft.at(ts);
    }
    let entry = feed.publisher().publish_new(draft)?;
    tracing::info!(id = entry.id, timestamp = entry.timestamp, "published entry");
    render_item(&EntryRow::from(&entry), output)?;
    Ok(())
}
