use anyhow::Result;
use clap::Args;
use livefeed_core::Timestamp;
use std::path::Path;

use super::{Feed, parse_timestamp, rows};
use crate::output::{OutputMode, render_list};

#[derive(Args, Debug)]
pub struct BetweenArgs {
    /// Inclusive lower bound (epoch seconds or RFC 3339).
    #[arg(value_parser = parse_timestamp)]
    pub start: Timestamp,

    /// Inclusive upper bound (epoch seconds or RFC 3339).
    #[arg(value_parser = parse_timestamp)]
    pub end: Timestamp,
}

/// Execute `livefeed between`: records in a time range, oldest first, with
/// edits folded into the entries they replace.
///
/// # Errors
///
/// Returns an error if the feed cannot be opened or read.
pub fn run_between(args: &BetweenArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let feed = Feed::open(project_root)?;
    if args.start > args.end {
        tracing::warn!(start = args.start, end = args.end, "empty range: start is after end");
    }
    let entries = feed.service.get_between_timestamps(args.start, args.end)?;
    render_list(&rows(entries.iter()), output)?;
    Ok(())
}
