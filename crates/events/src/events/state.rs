use serde::{Deserialize, Serialize};

/// Persistence notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    Initialized { database: String },

    RecordSaved { identifier: String },

    RecordRemoved { identifier: String },

    ReconciliationCompleted { checked: usize, removed: usize },

    AccountSaved { email: String },

    AccountReset,
}
