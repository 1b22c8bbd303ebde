use crate::model::{generate_id, Id, RefId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    /// Public identifier used in every URL; never the internal id.
    pub ref_id: RefId,
    pub author_id: Id,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(ref_id: RefId, author_id: Id, text: String) -> Self {
        Self {
            id: generate_id(),
            ref_id,
            author_id,
            text,
            created_at: Utc::now(),
        }
    }

    pub fn is_authored_by(&self, user_id: &Id) -> bool {
        &self.author_id == user_id
    }
}
