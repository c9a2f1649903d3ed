//! User model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub is_system_admin: bool,
    /// bcrypt hash; only used by the (out-of-scope) password sign-in path.
    /// Carried so the schema matches the bootstrap admin flow.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}
