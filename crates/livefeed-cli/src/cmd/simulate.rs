use anyhow::Result;
use clap::Args;
use livefeed_core::endpoint::{EntryResponse, LazyloadResponse, Route};
use livefeed_core::loader::{
    FeedItem, Fetcher, MemoryView, ServiceFetcher, WindowedLoader, drive,
};
use livefeed_core::query::EntryFilter;
use livefeed_core::{EntryId, Timestamp};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::Feed;
use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Entries per rendered page; defaults to `[loader] page_size`.
    #[arg(
        long,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub page_size: Option<usize>,

    /// Click the key event with this id after the first page.
    #[arg(long)]
    pub key_event: Option<EntryId>,

    /// Number of "load more" clicks on the topmost affordance.
    #[arg(long, default_value_t = 0)]
    pub clicks: usize,

    /// Keep clicking until no affordance is left.
    #[arg(long, conflicts_with = "clicks")]
    pub all: bool,
}

/// Fetcher wrapper that records every request URL.
struct Recording<F> {
    inner: F,
    base: String,
    urls: Vec<String>,
}

impl<F: Fetcher> Fetcher for Recording<F> {
    fn lazyload(&mut self, max: Timestamp, min: Timestamp, index: usize) -> Result<LazyloadResponse> {
        self.urls
            .push(Route::Lazyload { max, min, index }.url(&self.base));
        self.inner.lazyload(max, min, index)
    }

    fn entry(&mut self, id: EntryId, index: usize) -> Result<EntryResponse> {
        self.urls.push(Route::Entry { id, index }.url(&self.base));
        self.inner.entry(id, index)
    }
}

#[derive(Debug, Serialize)]
struct SetSummary {
    index: usize,
    buffered: usize,
    cursor: Timestamp,
    floor: Timestamp,
    exhausted: bool,
    has_affordance: bool,
}

#[derive(Debug, Serialize)]
struct SimulateReport {
    requests: Vec<String>,
    clicks: usize,
    rendered: usize,
    state: String,
    sets: Vec<SetSummary>,
    items: Vec<FeedItem>,
    #[serde(skip)]
    view: String,
}

/// Execute `livefeed simulate`: run the windowed loader against the local
/// feed in-process and print what a reader would see.
///
/// # Errors
///
/// Returns an error if the feed cannot be opened or a request fails.
pub fn run_simulate(args: &SimulateArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let feed = Feed::open(project_root)?;
    let mut config = feed.config.loader.clone();
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    let base = config.endpoint_url.clone();

    let mut loader = WindowedLoader::new(config);
    let mut view = MemoryView::new();
    let mut fetcher = Recording {
        inner: ServiceFetcher::new(feed.endpoints()),
        base,
        urls: Vec::new(),
    };

    let latest = feed.service.get_latest_timestamp()?;
    let first = loader.init(latest, &mut view);
    drive(&mut loader, &mut fetcher, &mut view, first)?;

    if let Some(id) = args.key_event {
        let request = loader.click_key_event(id, &mut view);
        if request.is_none() {
            tracing::warn!(id, "key event click issued no request");
        }
        drive(&mut loader, &mut fetcher, &mut view, request)?;
    }

    // Every click renders at least one entry or retires an affordance.
    let limit = if args.all {
        feed.service.count(EntryFilter::default())? + loader.sets().len() + 1
    } else {
        args.clicks
    };
    let clicks = click_through(&mut loader, &mut fetcher, &mut view, limit)?;

    let report = SimulateReport {
        requests: fetcher.urls,
        clicks,
        rendered: loader.rendered_count(),
        state: loader.state().to_string(),
        sets: loader
            .sets()
            .iter()
            .enumerate()
            .map(|(index, set)| SetSummary {
                index,
                buffered: set.available(),
                cursor: set.cursor(),
                floor: set.floor(),
                exhausted: set.is_exhausted(),
                has_affordance: set.has_affordance(),
            })
            .collect(),
        items: view.items().to_vec(),
        view: view.to_string(),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            write!(w, "{}", r.view)?;
            writeln!(w, "requests: {}  rendered: {}", r.requests.len(), r.rendered)
        },
        |r, w| {
            pretty_section(w, "Requests")?;
            for url in &r.requests {
                writeln!(w, "  GET {url}")?;
            }
            writeln!(w)?;
            pretty_section(w, "Feed")?;
            write!(w, "{}", r.view)?;
            writeln!(w)?;
            pretty_section(w, "Entry sets")?;
            for set in &r.sets {
                writeln!(
                    w,
                    "  set {}: window ({}, {})  buffered {}{}{}",
                    set.index,
                    set.floor,
                    set.cursor,
                    set.buffered,
                    if set.exhausted { "  exhausted" } else { "" },
                    if set.has_affordance { "  [load more]" } else { "" },
                )?;
            }
            Ok(())
        },
    )
}

/// Click the topmost affordance up to `limit` times.
fn click_through<F: Fetcher>(
    loader: &mut WindowedLoader,
    fetcher: &mut F,
    view: &mut MemoryView,
    limit: usize,
) -> Result<usize> {
    let mut clicks = 0;
    while clicks < limit {
        let Some(&set) = view.affordances().first() else {
            break;
        };
        let request = loader.click_load_more(set, view);
        drive(loader, fetcher, view, request)?;
        clicks += 1;
    }
    Ok(clicks)
}
