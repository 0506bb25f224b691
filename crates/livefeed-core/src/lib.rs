//! livefeed-core library.
//!
//! Server side: [`store`] holds raw records, [`query::EntryQueryService`]
//! reads and aggregates them, [`publish::Publisher`] appends to the log and
//! [`endpoint`] answers the two client routes.
//!
//! Client side: [`loader::WindowedLoader`] pages through those routes and
//! reconciles update/delete events before rendering.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types where appropriate.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod endpoint;
pub mod entry;
pub mod error;
pub mod loader;
pub mod publish;
pub mod query;
pub mod store;

pub use aggregate::{Aggregate, OrderedEntries, aggregate, key_events};
pub use entry::{Entry, EntryId, EntryKind, PostId, Timestamp, WireEntry};
pub use error::ErrorCode;
pub use loader::{LoaderConfig, WindowedLoader};
pub use query::EntryQueryService;
