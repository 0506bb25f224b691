//! Request/response loop between a [`WindowedLoader`] and a data source.

use anyhow::Result;

use super::WindowedLoader;
use super::view::FeedView;
use crate::cache::EntryCache;
use crate::endpoint::{EntryResponse, Endpoints, LazyloadResponse, Route};
use crate::entry::{EntryId, Timestamp};
use crate::error::ErrorCode;
use crate::store::RecordStore;

/// Source of endpoint responses.
pub trait Fetcher {
    /// # Errors
    ///
    /// Returns an error when the request cannot be completed.
    fn lazyload(
        &mut self,
        max: Timestamp,
        min: Timestamp,
        index: usize,
    ) -> Result<LazyloadResponse>;

    /// # Errors
    ///
    /// Returns an error when the request cannot be completed.
    fn entry(&mut self, id: EntryId, index: usize) -> Result<EntryResponse>;
}

/// A request the fetcher could not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetching {url} failed: {reason}")]
pub struct TransportError {
    pub url: String,
    pub reason: String,
}

impl TransportError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::TransportFailure
    }
}

/// In-process fetcher over the endpoint handlers. Responses go through their
/// JSON form so the wire shapes are exercised end to end.
#[derive(Debug)]
pub struct ServiceFetcher<'svc, S, C> {
    endpoints: Endpoints<'svc, S, C>,
    requests: usize,
}

impl<'svc, S: RecordStore, C: EntryCache> ServiceFetcher<'svc, S, C> {
    pub const fn new(endpoints: Endpoints<'svc, S, C>) -> Self {
        Self {
            endpoints,
            requests: 0,
        }
    }

    /// Requests served so far.
    #[must_use]
    pub const fn requests(&self) -> usize {
        self.requests
    }

    fn round_trip<T: serde::de::DeserializeOwned>(&mut self, route: &Route) -> Result<T> {
        self.requests += 1;
        let body = self.endpoints.handle(route)?;
        tracing::trace!(path = %route, %body, "served request");
        Ok(serde_json::from_value(body)?)
    }
}

impl<S: RecordStore, C: EntryCache> Fetcher for ServiceFetcher<'_, S, C> {
    fn lazyload(
        &mut self,
        max: Timestamp,
        min: Timestamp,
        index: usize,
    ) -> Result<LazyloadResponse> {
        self.round_trip(&Route::Lazyload { max, min, index })
    }

    fn entry(&mut self, id: EntryId, index: usize) -> Result<EntryResponse> {
        self.round_trip(&Route::Entry { id, index })
    }
}

/// Serve `request` and every follow-up request the loader issues until it
/// goes idle. Returns the number of requests completed.
///
/// # Errors
///
/// Returns a [`TransportError`] when a fetch fails. The loader is left busy.
pub fn drive<F, V>(
    loader: &mut WindowedLoader,
    fetcher: &mut F,
    view: &mut V,
    request: Option<Route>,
) -> Result<usize, TransportError>
where
    F: Fetcher,
    V: FeedView,
{
    let mut completed = 0;
    let mut next = request;
    while let Some(route) = next {
        let url = route.url(&loader.config().endpoint_url);
        let failed = |err: anyhow::Error| {
            tracing::warn!(%url, error = %err, code = %ErrorCode::TransportFailure, "fetch failed");
            TransportError {
                url: url.clone(),
                reason: format!("{err:#}"),
            }
        };
        next = match route {
            Route::Lazyload { max, min, index } => {
                let response = fetcher.lazyload(max, min, index).map_err(failed)?;
                loader.on_lazyload_response(response, view)
            }
            Route::Entry { id, index } => {
                let response = fetcher.entry(id, index).map_err(failed)?;
                loader.on_entry_response(response, view)
            }
        };
        completed += 1;
    }
    Ok(completed)
}
