use anyhow::Result;
use clap::Args;
use livefeed_core::endpoint::Route;
use std::io::Write;
use std::path::Path;

use super::Feed;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Endpoint path, e.g. `lazyload/1700000000/0/?index=0` or `entry/12?index=1`.
    pub path: String,
}

/// Execute `livefeed get`: answer one endpoint request and print the JSON
/// body exactly as a client would receive it.
///
/// # Errors
///
/// Returns an error if the path is not a known route or the store fails.
pub fn run_get(args: &GetArgs, project_root: &Path) -> Result<()> {
    let feed = Feed::open(project_root)?;
    let route = Route::parse(&args.path)?;
    tracing::debug!(%route, "serving request");
    let body = feed.endpoints().handle(&route)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &body)?;
    writeln!(out)?;
    Ok(())
}
