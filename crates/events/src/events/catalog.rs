use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Catalog fetch notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogEvent {
    FetchStarted { source: String },

    /// Published only after a successful fetch
    AppsFetched { source: String, count: usize },

    FetchFailed {
        source: String,
        failure: FailureContext,
    },
}
