use anyhow::Result;
use clap::Args;
use livefeed_core::publish::Draft;
use livefeed_core::{EntryId, Timestamp};
use std::path::Path;

use super::{EntryRow, Feed, parse_timestamp};
use crate::output::{OutputMode, render_item};

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Id of the entry to edit.
    pub id: EntryId,

    /// Replacement content (HTML).
    pub content: String,

    /// Set or clear the key-event flag; kept as-is when omitted.
    #[arg(long)]
    pub key_event: Option<bool>,

    /// Author of the edit; the current author is kept when omitted.
    #[arg(long)]
    pub author: Option<String>,

    /// Timestamp (epoch seconds or RFC 3339); defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<Timestamp>,
}

/// Execute `livefeed edit`: append an update record replacing a live entry.
///
/// # Errors
///
/// Returns an error if the target is not live, the content is empty or the
/// timestamp predates the target.
pub fn run_edit(args: &EditArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let feed = Feed::open(project_root)?;
    let current = feed.service.get_current_by_id(args.id)?;

    let key_event = args
        .key_event
        .unwrap_or_else(|| current.as_ref().is_some_and(|e| e.key_event));
    let author = args
        .author
        .clone()
        .or_else(|| current.and_then(|e| e.author));

    let mut draft = Draft::new(args.content.clone()).key_event(key_event);
    if let Some(author) = author {
        draft = draft.author(author);
    }
    if let Some(ts) = args.at {
        draft = draft.at(ts);
    }
    let entry = feed.publisher().publish_update(args.id, draft)?;
    tracing::info!(id = entry.id, target = args.id, "published update");
    render_item(&EntryRow::from(&entry), output)?;
    Ok(())
}
