//! Endpoint handlers for the two client-facing fetch paths.
//!
//! ```text
//! <base>/lazyload/<max>/<min>/?index=<set>   -> LazyloadResponse
//! <base>/entry/<id>?index=<set>              -> EntryResponse
//! ```
//!
//! The HTTP layer itself is not part of this crate: [`Route::parse`] turns a
//! request path into a [`Route`] and [`Endpoints::handle`] produces the JSON
//! body. The same types are deserialized by the client-side loader.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cache::EntryCache;
use crate::entry::{EntryId, Timestamp, WireEntry};
use crate::error::ErrorCode;
use crate::query::EntryQueryService;
use crate::store::RecordStore;

/// Body of a lazy-loading page. Empty `entries` means the window is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyloadResponse {
    pub index: usize,
    #[serde(default)]
    pub entries: Vec<WireEntry>,
}

/// Body of a single-entry fetch, with the timestamps of the live entries
/// immediately older (`previous`) and newer (`next`) than it; 0 when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub index: usize,
    #[serde(default)]
    pub entries: Vec<WireEntry>,
    #[serde(default)]
    pub previous_timestamp: Timestamp,
    #[serde(default)]
    pub next_timestamp: Timestamp,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// A parsed endpoint request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Lazyload {
        max: Timestamp,
        min: Timestamp,
        index: usize,
    },
    Entry {
        id: EntryId,
        index: usize,
    },
}

/// Why a path could not be routed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no lazyload or entry segment in '{0}'")]
    UnknownPath(String),
    #[error("invalid number '{value}' for {field}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("entry path without an id")]
    MissingId,
}

impl RouteError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidRoute
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, RouteError> {
    value.parse().map_err(|_| RouteError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

impl Route {
    /// Parse a request path, with or without the endpoint base prefix.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] for unknown paths or non-numeric segments.
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        let (path_part, query) = path.split_once('?').unwrap_or((path, ""));

        let mut index = 0;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            if let Some(("index", value)) = pair.split_once('=') {
                index = parse_number("index", value)?;
            }
        }

        let segments: Vec<&str> = path_part.split('/').filter(|s| !s.is_empty()).collect();
        let Some(pos) = segments
            .iter()
            .position(|s| *s == "lazyload" || *s == "entry")
        else {
            return Err(RouteError::UnknownPath(path.to_string()));
        };
        let rest = &segments[pos + 1..];

        if segments[pos] == "entry" {
            let id = rest.first().ok_or(RouteError::MissingId)?;
            return Ok(Self::Entry {
                id: parse_number("id", id)?,
                index,
            });
        }

        let (max, min) = match rest {
            [] => (0, 0),
            [max] => (parse_number("max", max)?, 0),
            [max, min, ..] => (parse_number("max", max)?, parse_number("min", min)?),
        };
        Ok(Self::Lazyload { max, min, index })
    }

    /// The path relative to the endpoint base, as the client requests it.
    #[must_use]
    pub fn path(&self) -> String {
        self.to_string()
    }

    /// Full request URL under `base` (e.g. `/liveblog/`).
    #[must_use]
    pub fn url(&self, base: &str) -> String {
        format!("{}/{self}", base.trim_end_matches('/'))
    }

    /// The entry set the request is tagged with.
    #[must_use]
    pub const fn index(&self) -> usize {
        match *self {
            Self::Lazyload { index, .. } | Self::Entry { index, .. } => index,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Lazyload { max: 0, min: 0, index } => write!(f, "lazyload/?index={index}"),
            Self::Lazyload { max, min, index } => {
                write!(f, "lazyload/{max}/{min}/?index={index}")
            }
            Self::Entry { id, index } => write!(f, "entry/{id}?index={index}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Request handlers over one feed.
#[derive(Debug)]
pub struct Endpoints<'svc, S, C> {
    service: &'svc EntryQueryService<S, C>,
    page_size: usize,
}

impl<'svc, S: RecordStore, C: EntryCache> Endpoints<'svc, S, C> {
    pub const fn new(service: &'svc EntryQueryService<S, C>, page_size: usize) -> Self {
        Self { service, page_size }
    }

    #[must_use]
    pub const fn service(&self) -> &'svc EntryQueryService<S, C> {
        self.service
    }

    /// One page of entries older than `max` (and newer than `min`).
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn lazyload(
        &self,
        max: Timestamp,
        min: Timestamp,
        index: usize,
    ) -> Result<LazyloadResponse> {
        let entries = self
            .service
            .get_for_lazyloading(max, min)?
            .iter()
            .take(self.page_size)
            .map(|entry| entry.to_wire())
            .collect();
        Ok(LazyloadResponse { index, entries })
    }

    /// The current state of one live entry plus its neighbours' timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn single_entry(&self, id: EntryId, index: usize) -> Result<EntryResponse> {
        let live = self.service.get_current()?;
        let Some(pos) = live.iter().position(|entry| entry.id == id) else {
            tracing::debug!(entry_id = id, code = %ErrorCode::NotFound, "single entry not live");
            return Ok(EntryResponse {
                index,
                ..EntryResponse::default()
            });
        };

        let newer = pos.checked_sub(1).and_then(|p| live.get(p));
        let older = live.get(pos + 1);
        Ok(EntryResponse {
            index,
            entries: vec![live[pos].to_wire()],
            previous_timestamp: older.map_or(0, |e| e.timestamp),
            next_timestamp: newer.map_or(0, |e| e.timestamp),
        })
    }

    /// Dispatch a parsed route and serialize the response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or serialization fails.
    pub fn handle(&self, route: &Route) -> Result<serde_json::Value> {
        let body = match *route {
            Route::Lazyload { max, min, index } => {
                serde_json::to_value(self.lazyload(max, min, index)?)?
            }
            Route::Entry { id, index } => serde_json::to_value(self.single_entry(id, index)?)?,
        };
        Ok(body)
    }
}
