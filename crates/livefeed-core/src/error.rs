use std::fmt;

/// Machine-readable error codes for the feed's failure taxonomy.
///
/// Most of these never surface as `Err` values: the aggregation and query
/// layers resolve `NotFound`, `DanglingReference` and `MalformedRecord` to
/// absence. The codes still tag the log lines emitted when that happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    NotFound,
    DanglingReference,
    MalformedRecord,
    InvalidRoute,
    StorageFailure,
    TransportFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::NotFound => "E2001",
            Self::DanglingReference => "E2002",
            Self::MalformedRecord => "E2003",
            Self::InvalidRoute => "E2004",
            Self::StorageFailure => "E5001",
            Self::TransportFailure => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Feed not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::NotFound => "Entry not found",
            Self::DanglingReference => "Update or delete targets a missing entry",
            Self::MalformedRecord => "Malformed record",
            Self::InvalidRoute => "Unrecognized endpoint path",
            Self::StorageFailure => "Record storage failure",
            Self::TransportFailure => "Fetch failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `livefeed init` to create .livefeed/."),
            Self::ConfigParseError => Some("Fix syntax in .livefeed/config.toml and retry."),
            Self::NotFound | Self::DanglingReference => None,
            Self::MalformedRecord => {
                Some("The record is skipped; check its timestamp, type and content.")
            }
            Self::InvalidRoute => {
                Some("Use lazyload/<max>/<min>/?index=<n> or entry/<id>?index=<n>.")
            }
            Self::StorageFailure => Some("Check that the feed database is readable and writable."),
            Self::TransportFailure => {
                Some("The loader stays busy; reinitialize it to resume loading.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
