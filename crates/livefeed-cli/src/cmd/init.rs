use anyhow::{Context as _, Result};
use clap::Args;
use livefeed_core::config::{PROJECT_DIR, ProjectConfig, write_project_config};
use livefeed_core::store::sqlite::SqliteStore;
use livefeed_core::{PostId, config};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::{CommandError, STORE_FILE};
use crate::output::{OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force re-initialization even if `.livefeed/` already exists.
    #[arg(long)]
    pub force: bool,

    /// Post (feed) id the entries belong to.
    #[arg(long)]
    pub post_id: Option<PostId>,

    /// Record type and status that mark feed entries.
    #[arg(long)]
    pub key: Option<String>,

    /// Entries per lazyload response.
    #[arg(
        long,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct InitReport {
    root: String,
    config: String,
    store: String,
    post_id: PostId,
    key: String,
    schema_version: u32,
}

/// Execute `livefeed init`. Creates the project skeleton:
///
/// ```text
/// .livefeed/
///   config.toml     (feed, loader and server settings)
///   feed.sqlite3    (record store, migrated to the latest schema)
/// ```
///
/// With `--force` an existing config is rewritten; records already in the
/// store are kept.
///
/// # Errors
///
/// Returns an error if `.livefeed/` already exists and `--force` is not set,
/// or if any filesystem or store operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let dir = project_root.join(PROJECT_DIR);
    if dir.exists() && !args.force {
        return Err(CommandError::AlreadyInitialized.into());
    }

    let mut cfg = if args.force {
        config::load_project_config(project_root).unwrap_or_default()
    } else {
        ProjectConfig::default()
    };
    if let Some(post_id) = args.post_id {
        cfg.feed.post_id = post_id;
    }
    if let Some(ref key) = args.key {
        cfg.feed.key.clone_from(key);
    }
    if let Some(page_size) = args.page_size {
        cfg.server.page_size = page_size;
        cfg.loader.page_size = page_size;
    }
    write_project_config(project_root, &cfg)?;

    let store_path = dir.join(STORE_FILE);
    let store = SqliteStore::open(&store_path)
        .with_context(|| format!("Failed to create store at {}", store_path.display()))?;
    let schema_version =
        livefeed_core::store::sqlite::current_schema_version(store.connection())?;
    tracing::info!(root = %project_root.display(), schema_version, "initialized feed");

    let report = InitReport {
        root: project_root.display().to_string(),
        config: dir.join("config.toml").display().to_string(),
        store: store_path.display().to_string(),
        post_id: cfg.feed.post_id,
        key: cfg.feed.key,
        schema_version,
    };
    render(output, &report, |r, w| {
        writeln!(w, "✓ Initialized livefeed in {}", r.root)?;
        pretty_kv(w, "config", &r.config)?;
        pretty_kv(w, "store", &r.store)?;
        pretty_kv(w, "feed", format!("post {} ({})", r.post_id, r.key))
    })
}
