use crate::model::{generate_id, Id};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A named grouping of users and messages. Holds weak references (ids) only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub id: Id,
    pub name: String,
    pub user_ids: Vec<Id>,
    pub message_ids: Vec<Id>,
    pub created_at: DateTime<Utc>,
}

impl Log {
    pub fn new(name: String, user_ids: Vec<Id>, message_ids: Vec<Id>) -> Self {
        Self {
            id: generate_id(),
            name,
            user_ids: ordered_set(user_ids),
            message_ids: ordered_set(message_ids),
            created_at: Utc::now(),
        }
    }

    pub fn references_message(&self, message_id: &Id) -> bool {
        self.message_ids.contains(message_id)
    }

    /// Drop a user reference, returning whether anything changed
    pub fn remove_user(&mut self, user_id: &Id) -> bool {
        let before = self.user_ids.len();
        self.user_ids.retain(|id| id != user_id);
        before != self.user_ids.len()
    }

    /// Drop every listed message reference, returning whether anything changed
    pub fn remove_messages(&mut self, message_ids: &[Id]) -> bool {
        let before = self.message_ids.len();
        self.message_ids.retain(|id| !message_ids.contains(id));
        before != self.message_ids.len()
    }
}

/// Deduplicate ids while keeping first-seen order.
pub fn ordered_set(ids: Vec<Id>) -> Vec<Id> {
    ids.into_iter().unique().collect()
}
