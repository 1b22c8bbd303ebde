use crate::model::{generate_id, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String) -> Self {
        Self {
            id: generate_id(),
            name,
            created_at: Utc::now(),
        }
    }
}
