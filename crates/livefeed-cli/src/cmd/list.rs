use anyhow::Result;
use clap::Args;
use livefeed_core::query::EntryFilter;
use livefeed_core::store::SortOrder;
use std::path::Path;

use super::{Feed, rows};
use crate::output::{OutputMode, render_list};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// List the raw record log (updates and deletes included) instead of
    /// the aggregated feed.
    #[arg(long)]
    pub raw: bool,

    /// Listing order: `asc` (oldest first) or `desc` (newest first).
    #[arg(long, default_value_t = SortOrder::Desc)]
    pub order: SortOrder,

    /// Maximum number of entries to print.
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Execute `livefeed list`.
///
/// # Errors
///
/// Returns an error if the feed cannot be opened or read.
pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let feed = Feed::open(project_root)?;
    let entries = if args.raw {
        feed.service.get_all(EntryFilter {
            order: args.order,
            limit: args.limit,
        })?
    } else {
        let mut current = feed.service.get_current()?;
        if args.order == SortOrder::Asc {
            current.reverse();
        }
        if let Some(limit) = args.limit {
            current.truncate(limit);
        }
        current
    };
    tracing::debug!(count = entries.len(), raw = args.raw, "listed entries");
    render_list(&rows(&entries), output)?;
    Ok(())
}
