//! Change notifications for views that render the current location.

use crate::types::CacheKey;

/// Where a resolved document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// Stored entry within the freshness window
    Fresh,
    /// Stored entry past the freshness window, served because the network is down
    StaleOffline,
    /// Downloaded from the provider
    Fetched,
}

/// Sent after every operation that changes what the default view shows.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    Resolved {
        key: CacheKey,
        city: String,
        source: ResolvedFrom,
    },
    /// Local forecasts and the current location were cleared
    Cleared,
}
