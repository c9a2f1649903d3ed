//! Work queue message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A message on a named work queue collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: Id,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub msg_type: String,
    pub msg: serde_json::Value,
}
