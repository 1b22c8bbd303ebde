use parking_lot::RwLock;

use crate::model::{next_ref_id, ordered_set, Id, Log, Message, RefId, User};
use crate::store::error::{StoreError, StoreResult};
use crate::store::traits::{LogStore, MessageStore, Store, UserStore};

#[derive(Debug, Default)]
struct Collections {
    users: Vec<User>,
    messages: Vec<Message>,
    logs: Vec<Log>,
}

/// In-process store. Every call takes the lock once, so uniqueness checks and
/// the write that follows them cannot interleave with another request.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty all three collections
    pub fn drop_all(&self) {
        let mut collections = self.collections.write();
        collections.users.clear();
        collections.messages.clear();
        collections.logs.clear();
    }
}

fn pick_in_order<T: Clone, K: PartialEq>(
    items: &[T],
    keys: &[K],
    key_of: impl Fn(&T) -> &K,
) -> Vec<T> {
    let mut picked: Vec<T> = Vec::new();
    for key in keys {
        if let Some(item) = items.iter().find(|item| key_of(item) == key) {
            if !picked.iter().any(|seen| key_of(seen) == key) {
                picked.push(item.clone());
            }
        }
    }
    picked
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.collections.read().users.clone())
    }

    async fn get_user_by_id(&self, id: &Id) -> StoreResult<User> {
        self.collections
            .read()
            .users
            .iter()
            .find(|user| &user.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn get_users_by_name(&self, names: &[String]) -> StoreResult<Vec<User>> {
        let collections = self.collections.read();
        Ok(pick_in_order(&collections.users, names, |user| &user.name))
    }

    async fn create_user(&self, name: &str) -> StoreResult<User> {
        let mut collections = self.collections.write();
        if let Some(existing) = collections.users.iter().find(|user| user.name == name) {
            return Ok(existing.clone());
        }

        let user = User::new(name.to_string());
        collections.users.push(user.clone());
        Ok(user)
    }

    async fn update_user_name(&self, id: &Id, new_name: &str) -> StoreResult<()> {
        let mut collections = self.collections.write();
        if collections
            .users
            .iter()
            .any(|user| user.name == new_name && &user.id != id)
        {
            return Err(StoreError::conflict("user", new_name));
        }

        let user = collections
            .users
            .iter_mut()
            .find(|user| &user.id == id)
            .ok_or_else(|| StoreError::not_found("user", id))?;
        user.name = new_name.to_string();
        Ok(())
    }

    async fn remove_user_record(&self, id: &Id) -> StoreResult<()> {
        self.collections.write().users.retain(|user| &user.id != id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageStore for MemoryStore {
    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        Ok(self.collections.read().messages.clone())
    }

    async fn list_messages_by_author(&self, author_id: &Id) -> StoreResult<Vec<Message>> {
        Ok(self
            .collections
            .read()
            .messages
            .iter()
            .filter(|message| message.is_authored_by(author_id))
            .cloned()
            .collect())
    }

    async fn get_message_by_id(&self, id: &Id) -> StoreResult<Message> {
        self.collections
            .read()
            .messages
            .iter()
            .find(|message| &message.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("message", id))
    }

    async fn get_messages_by_ref_id(&self, ref_ids: &[RefId]) -> StoreResult<Vec<Message>> {
        let collections = self.collections.read();
        Ok(pick_in_order(&collections.messages, ref_ids, |message| {
            &message.ref_id
        }))
    }

    async fn create_message(&self, author_id: &Id, text: &str) -> StoreResult<Message> {
        let mut collections = self.collections.write();
        if !collections.users.iter().any(|user| &user.id == author_id) {
            return Err(StoreError::not_found("user", author_id));
        }

        let current_max = collections.messages.iter().map(|m| m.ref_id).max();
        let message = Message::new(
            next_ref_id(current_max),
            author_id.clone(),
            text.to_string(),
        );
        collections.messages.push(message.clone());
        Ok(message)
    }

    async fn update_message_text(&self, id: &Id, text: &str) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let message = collections
            .messages
            .iter_mut()
            .find(|message| &message.id == id)
            .ok_or_else(|| StoreError::not_found("message", id))?;
        message.text = text.to_string();
        Ok(())
    }

    async fn update_message_author(&self, id: &Id, author_id: &Id) -> StoreResult<()> {
        let mut collections = self.collections.write();
        if !collections.users.iter().any(|user| &user.id == author_id) {
            return Err(StoreError::not_found("user", author_id));
        }

        let message = collections
            .messages
            .iter_mut()
            .find(|message| &message.id == id)
            .ok_or_else(|| StoreError::not_found("message", id))?;
        message.author_id = author_id.clone();
        Ok(())
    }

    async fn remove_message_records(&self, ids: &[Id]) -> StoreResult<()> {
        self.collections
            .write()
            .messages
            .retain(|message| !ids.contains(&message.id));
        Ok(())
    }
}

#[async_trait::async_trait]
impl LogStore for MemoryStore {
    async fn list_logs(&self) -> StoreResult<Vec<Log>> {
        Ok(self.collections.read().logs.clone())
    }

    async fn get_log_by_id(&self, id: &Id) -> StoreResult<Log> {
        self.collections
            .read()
            .logs
            .iter()
            .find(|log| &log.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("log", id))
    }

    async fn get_logs_by_name(&self, names: &[String]) -> StoreResult<Vec<Log>> {
        let collections = self.collections.read();
        Ok(pick_in_order(&collections.logs, names, |log| &log.name))
    }

    async fn create_log(
        &self,
        user_ids: &[Id],
        message_ids: &[Id],
        name: &str,
    ) -> StoreResult<Log> {
        let mut collections = self.collections.write();
        if let Some(existing) = collections.logs.iter().find(|log| log.name == name) {
            return Ok(existing.clone());
        }

        let log = Log::new(name.to_string(), user_ids.to_vec(), message_ids.to_vec());
        collections.logs.push(log.clone());
        Ok(log)
    }

    async fn update_log_name(&self, id: &Id, new_name: &str) -> StoreResult<()> {
        let mut collections = self.collections.write();
        if collections
            .logs
            .iter()
            .any(|log| log.name == new_name && &log.id != id)
        {
            return Err(StoreError::conflict("log", new_name));
        }

        let log = collections
            .logs
            .iter_mut()
            .find(|log| &log.id == id)
            .ok_or_else(|| StoreError::not_found("log", id))?;
        log.name = new_name.to_string();
        Ok(())
    }

    async fn update_log_users(&self, id: &Id, user_ids: &[Id]) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let log = collections
            .logs
            .iter_mut()
            .find(|log| &log.id == id)
            .ok_or_else(|| StoreError::not_found("log", id))?;
        log.user_ids = ordered_set(user_ids.to_vec());
        Ok(())
    }

    async fn update_log_messages(&self, id: &Id, message_ids: &[Id]) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let log = collections
            .logs
            .iter_mut()
            .find(|log| &log.id == id)
            .ok_or_else(|| StoreError::not_found("log", id))?;
        log.message_ids = ordered_set(message_ids.to_vec());
        Ok(())
    }

    async fn pull_user_from_logs(&self, user_id: &Id) -> StoreResult<()> {
        for log in self.collections.write().logs.iter_mut() {
            log.remove_user(user_id);
        }
        Ok(())
    }

    async fn pull_messages_from_logs(&self, message_ids: &[Id]) -> StoreResult<()> {
        for log in self.collections.write().logs.iter_mut() {
            log.remove_messages(message_ids);
        }
        Ok(())
    }

    async fn delete_log(&self, id: &Id) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let before = collections.logs.len();
        collections.logs.retain(|log| &log.id != id);
        if collections.logs.len() == before {
            return Err(StoreError::not_found("log", id));
        }
        Ok(())
    }
}

impl Store for MemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_user_is_idempotent_by_name() {
        let store = MemoryStore::new();

        let first = store.create_user("alice").await.unwrap();
        let second = store.create_user("alice").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ref_ids_continue_from_max() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice").await.unwrap();

        let first = store.create_message(&alice.id, "one").await.unwrap();
        let second = store.create_message(&alice.id, "two").await.unwrap();
        assert_eq!(first.ref_id, 1);
        assert_eq!(second.ref_id, 2);

        // Deleting the lower refId must not cause reuse of the higher one
        store.delete_message(&first.id).await.unwrap();
        let third = store.create_message(&alice.id, "three").await.unwrap();
        assert_eq!(third.ref_id, 3);
    }

    #[tokio::test]
    async fn test_create_message_requires_author() {
        let store = MemoryStore::new();
        let err = store
            .create_message(&"missing".to_string(), "hi")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_lookup_by_name_returns_matched_subset_in_request_order() {
        let store = MemoryStore::new();
        store.create_user("alice").await.unwrap();
        store.create_user("bob").await.unwrap();

        let found = store
            .get_users_by_name(&["bob".to_string(), "ghost".to_string(), "alice".to_string()])
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice"]);

        assert!(store.get_user_by_name("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rename_to_taken_name_conflicts() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice").await.unwrap();
        store.create_user("bob").await.unwrap();

        let err = store.update_user_name(&alice.id, "bob").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        // Renaming to the current name is a no-op
        store.update_user_name(&alice.id, "alice").await.unwrap();
        store.update_user_name(&alice.id, "carol").await.unwrap();
        assert_eq!(store.get_user_by_id(&alice.id).await.unwrap().name, "carol");
    }

    #[tokio::test]
    async fn test_delete_user_cascades_into_messages_and_logs() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice").await.unwrap();
        let bob = store.create_user("bob").await.unwrap();
        let from_alice = store.create_message(&alice.id, "hi").await.unwrap();
        let from_bob = store.create_message(&bob.id, "hey").await.unwrap();
        let log = store
            .create_log(
                &[alice.id.clone(), bob.id.clone()],
                &[from_alice.id.clone(), from_bob.id.clone()],
                "standup",
            )
            .await
            .unwrap();

        store.delete_user(&alice.id).await.unwrap();

        assert!(store.get_user_by_id(&alice.id).await.unwrap_err().is_not_found());
        let remaining: Vec<_> = store.list_messages().await.unwrap();
        assert_eq!(remaining, vec![from_bob.clone()]);

        let log = store.get_log_by_id(&log.id).await.unwrap();
        assert_eq!(log.user_ids, vec![bob.id]);
        assert_eq!(log.message_ids, vec![from_bob.id]);
    }

    #[tokio::test]
    async fn test_delete_message_removes_log_references() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice").await.unwrap();
        let message = store.create_message(&alice.id, "hi").await.unwrap();
        let log = store
            .create_log(&[alice.id.clone()], &[message.id.clone()], "standup")
            .await
            .unwrap();

        store.delete_message(&message.id).await.unwrap();

        let log = store.get_log_by_id(&log.id).await.unwrap();
        assert!(log.message_ids.is_empty());
        assert_eq!(log.user_ids, vec![alice.id]);
        assert!(store.delete_message(&message.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_log_users_replaces() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice").await.unwrap();
        let bob = store.create_user("bob").await.unwrap();
        let log = store
            .create_log(&[alice.id.clone()], &[], "standup")
            .await
            .unwrap();

        store
            .update_log_users(&log.id, &[bob.id.clone(), bob.id.clone()])
            .await
            .unwrap();

        assert_eq!(store.get_log_by_id(&log.id).await.unwrap().user_ids, vec![bob.id]);
    }

    #[tokio::test]
    async fn test_drop_all() {
        let store = MemoryStore::new();
        store.create_user("alice").await.unwrap();
        store.create_log(&[], &[], "empty").await.unwrap();

        store.drop_all();

        assert!(store.list_users().await.unwrap().is_empty());
        assert!(store.list_logs().await.unwrap().is_empty());
    }
}
