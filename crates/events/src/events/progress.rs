use serde::{Deserialize, Serialize};

/// Progress tracker lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        id: String,
        operation: String,
        total: u64,
    },

    Updated {
        id: String,
        fraction: f64,
    },

    Completed {
        id: String,
    },

    Cancelled {
        id: String,
    },
}
