//! Demo data for a fresh store, loaded when `LOAD_SEED_DATA=true`.

use anyhow::Result;

use crate::model::Id;
use crate::store::traits::Store;

const USERS: [&str; 3] = ["ada", "grace", "linus"];

const MESSAGES: [(&str, &str); 5] = [
    ("ada", "Morning all, standup in five."),
    ("grace", "Deploy went out last night, no alarms."),
    ("linus", "Reviewing the storage patch today."),
    ("ada", "Can someone pair on the flaky test?"),
    ("grace", "I'll take it after lunch."),
];

/// Creates the demo users, their messages and a `standup` log holding all of
/// them. Creation is idempotent by name, so loading twice only adds messages.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    let mut user_ids: Vec<Id> = Vec::with_capacity(USERS.len());
    for name in USERS {
        user_ids.push(store.create_user(name).await?.id);
    }

    let mut message_ids: Vec<Id> = Vec::with_capacity(MESSAGES.len());
    for (author, text) in MESSAGES {
        let author = store.get_user_by_name(author).await?;
        message_ids.push(store.create_message(&author.id, text).await?.id);
    }

    let standup = store.create_log(&user_ids, &message_ids, "standup").await?;
    log::info!(
        "Seeded {} users, {} messages and log '{}'",
        user_ids.len(),
        message_ids.len(),
        standup.name
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LogStore, MemoryStore, MessageStore, UserStore};

    #[tokio::test]
    async fn test_seed_populates_store() {
        let store = MemoryStore::new();
        load_seed_data(&store).await.unwrap();

        assert_eq!(store.list_users().await.unwrap().len(), 3);
        assert_eq!(store.list_messages().await.unwrap().len(), 5);

        let standup = store.get_log_by_name("standup").await.unwrap();
        assert_eq!(standup.user_ids.len(), 3);
        assert_eq!(standup.message_ids.len(), 5);
    }
}
