pub mod add;
pub mod between;
pub mod delete;
pub mod edit;
pub mod get;
pub mod init;
pub mod key;
pub mod key_events;
pub mod latest;
pub mod list;
pub mod simulate;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use livefeed_core::cache::MemoryCache;
use livefeed_core::config::{PROJECT_DIR, ProjectConfig, load_project_config};
use livefeed_core::endpoint::{Endpoints, RouteError};
use livefeed_core::loader::TransportError;
use livefeed_core::publish::{PublishError, Publisher};
use livefeed_core::store::sqlite::SqliteStore;
use livefeed_core::{Entry, EntryId, EntryKind, EntryQueryService, ErrorCode, Timestamp};
use serde::Serialize;

use crate::output::{CliError, Renderable};

/// Store file inside the project directory.
pub const STORE_FILE: &str = "feed.sqlite3";

pub type FeedService = EntryQueryService<SqliteStore, MemoryCache>;

/// Failures raised by the CLI itself rather than the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("no .livefeed/ directory found in {} or any parent", .0.display())]
    NotInitialized(PathBuf),
    #[error(".livefeed/ already exists; use `livefeed init --force` to reinitialize")]
    AlreadyInitialized,
    #[error("failed to load project config: {0}")]
    Config(String),
}

impl CommandError {
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::NotInitialized(_) => Some(ErrorCode::NotInitialized),
            Self::AlreadyInitialized => None,
            Self::Config(_) => Some(ErrorCode::ConfigParseError),
        }
    }
}

/// Map any command failure to its rendered form, recovering the stable
/// error code when the cause is a known error type.
pub fn cli_error(err: &anyhow::Error) -> CliError {
    let code = if let Some(e) = err.downcast_ref::<CommandError>() {
        e.code()
    } else if let Some(e) = err.downcast_ref::<PublishError>() {
        Some(e.code())
    } else if let Some(e) = err.downcast_ref::<RouteError>() {
        Some(e.code())
    } else {
        err.downcast_ref::<TransportError>().map(TransportError::code)
    };
    let message = format!("{err:#}");
    match code {
        Some(code) => CliError::from_code(code, message),
        None => CliError {
            message,
            suggestion: None,
            error_code: None,
        },
    }
}

/// Walk up from `start` looking for a directory containing `.livefeed/`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(PROJECT_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// An initialized feed: its config and the query service over its store.
pub struct Feed {
    pub config: ProjectConfig,
    pub service: FeedService,
}

impl Feed {
    /// Open the feed whose project directory is at or above `start`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NotInitialized`] when no project directory is
    /// found, or an error if the config or store cannot be opened.
    pub fn open(start: &Path) -> Result<Self> {
        let root = find_project_root(start)
            .ok_or_else(|| CommandError::NotInitialized(start.to_path_buf()))?;
        let config = load_project_config(&root)
            .map_err(|err| CommandError::Config(format!("{err:#}")))?;
        let store = SqliteStore::open(&root.join(PROJECT_DIR).join(STORE_FILE))?;
        let service = EntryQueryService::new(
            store,
            MemoryCache::new(),
            config.feed.post_id,
            config.feed.key.clone(),
        );
        tracing::debug!(root = %root.display(), post_id = config.feed.post_id, "opened feed");
        Ok(Self { config, service })
    }

    pub const fn publisher(&self) -> Publisher<'_, SqliteStore, MemoryCache> {
        Publisher::new(&self.service)
    }

    pub const fn endpoints(&self) -> Endpoints<'_, SqliteStore, MemoryCache> {
        Endpoints::new(&self.service, self.config.server.page_size)
    }
}

/// Parse `--at` values: epoch seconds or an RFC 3339 date-time.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, String> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<Timestamp>() {
        return Ok(seconds);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp())
        .map_err(|_| format!("invalid timestamp '{raw}': expected epoch seconds or RFC 3339"))
}

/// Human-readable UTC rendering of a timestamp.
pub fn format_timestamp(ts: Timestamp) -> String {
    chrono::DateTime::from_timestamp(ts, 0).map_or_else(
        || ts.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

// ---------------------------------------------------------------------------
// Entry rendering
// ---------------------------------------------------------------------------

/// One log entry as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct EntryRow {
    pub id: EntryId,
    pub kind: EntryKind,
    pub timestamp: Timestamp,
    pub time: String,
    pub key_event: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<EntryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub content: String,
}

impl From<&Entry> for EntryRow {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind,
            timestamp: entry.timestamp,
            time: format_timestamp(entry.timestamp),
            key_event: entry.key_event,
            target: entry.target(),
            author: entry.author.clone(),
            content: entry.content.clone(),
        }
    }
}

pub fn rows<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Vec<EntryRow> {
    entries.into_iter().map(EntryRow::from).collect()
}

impl Renderable for EntryRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let key = if self.key_event { "  ★ key event" } else { "" };
        let target = self
            .target
            .map_or_else(String::new, |t| format!(" → #{t}"));
        writeln!(w, "#{:<6} {}  {}{target}{key}", self.id, self.time, self.kind)?;
        if let Some(ref author) = self.author {
            writeln!(w, "        by {author}")?;
        }
        if !self.content.is_empty() {
            writeln!(w, "        {}", self.content)?;
        }
        Ok(())
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, self).map_err(io::Error::other)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let target = self.target.map_or_else(|| "-".to_string(), |t| t.to_string());
        writeln!(
            w,
            "{}  {}  {}  {}  {target}  {}",
            self.id,
            self.kind,
            self.timestamp,
            u8::from(self.key_event),
            self.content
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "KIND", "TIMESTAMP", "KEY", "TARGET", "CONTENT"]
    }
}
