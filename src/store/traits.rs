use crate::model::{Id, Log, Message, RefId, User};
use crate::store::error::{StoreError, StoreResult};

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Full collection snapshot in insertion order
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn get_user_by_id(&self, id: &Id) -> StoreResult<User>;
    /// Every user whose name is listed, in request order. Unknown names are skipped.
    async fn get_users_by_name(&self, names: &[String]) -> StoreResult<Vec<User>>;
    /// Returns the existing user when the name is taken
    async fn create_user(&self, name: &str) -> StoreResult<User>;
    async fn update_user_name(&self, id: &Id, new_name: &str) -> StoreResult<()>;
    /// Removes the record only; see [`Store::delete_user`] for the cascade
    async fn remove_user_record(&self, id: &Id) -> StoreResult<()>;

    async fn get_user_by_name(&self, name: &str) -> StoreResult<User> {
        self.get_users_by_name(&[name.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("user", name))
    }
}

#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    async fn list_messages(&self) -> StoreResult<Vec<Message>>;
    async fn list_messages_by_author(&self, author_id: &Id) -> StoreResult<Vec<Message>>;
    async fn get_message_by_id(&self, id: &Id) -> StoreResult<Message>;
    /// Every message whose refId is listed, in request order. Unknown refIds are skipped.
    async fn get_messages_by_ref_id(&self, ref_ids: &[RefId]) -> StoreResult<Vec<Message>>;
    /// Assigns `max(refId) + 1`, or 1 for an empty collection
    async fn create_message(&self, author_id: &Id, text: &str) -> StoreResult<Message>;
    async fn update_message_text(&self, id: &Id, text: &str) -> StoreResult<()>;
    async fn update_message_author(&self, id: &Id, author_id: &Id) -> StoreResult<()>;
    /// Removes the records only; see [`Store::delete_messages`] for the cascade
    async fn remove_message_records(&self, ids: &[Id]) -> StoreResult<()>;

    async fn get_message_by_ref_id(&self, ref_id: RefId) -> StoreResult<Message> {
        self.get_messages_by_ref_id(&[ref_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("message", ref_id))
    }
}

#[async_trait::async_trait]
pub trait LogStore: Send + Sync {
    async fn list_logs(&self) -> StoreResult<Vec<Log>>;
    async fn get_log_by_id(&self, id: &Id) -> StoreResult<Log>;
    /// Every log whose name is listed, in request order. Unknown names are skipped.
    async fn get_logs_by_name(&self, names: &[String]) -> StoreResult<Vec<Log>>;
    /// Returns the existing log when the name is taken
    async fn create_log(&self, user_ids: &[Id], message_ids: &[Id], name: &str)
        -> StoreResult<Log>;
    async fn update_log_name(&self, id: &Id, new_name: &str) -> StoreResult<()>;
    async fn update_log_users(&self, id: &Id, user_ids: &[Id]) -> StoreResult<()>;
    async fn update_log_messages(&self, id: &Id, message_ids: &[Id]) -> StoreResult<()>;
    /// Strip a user reference from every log
    async fn pull_user_from_logs(&self, user_id: &Id) -> StoreResult<()>;
    /// Strip message references from every log
    async fn pull_messages_from_logs(&self, message_ids: &[Id]) -> StoreResult<()>;
    async fn delete_log(&self, id: &Id) -> StoreResult<()>;

    async fn get_log_by_name(&self, name: &str) -> StoreResult<Log> {
        self.get_logs_by_name(&[name.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("log", name))
    }
}

/// The full repository. Cascading deletes are composed here from the primitive
/// writes above; each step is an independent write, so a failure part-way leaves
/// the earlier steps applied. Re-running the delete finishes the cleanup.
#[async_trait::async_trait]
pub trait Store: UserStore + MessageStore + LogStore + Send + Sync {
    /// Delete a user, every message they authored, and every log reference to either.
    async fn delete_user(&self, id: &Id) -> StoreResult<()> {
        let user = self.get_user_by_id(id).await?;

        let authored: Vec<Id> = self
            .list_messages_by_author(&user.id)
            .await?
            .into_iter()
            .map(|message| message.id)
            .collect();
        if !authored.is_empty() {
            self.delete_messages(&authored).await?;
        }

        self.pull_user_from_logs(&user.id).await?;
        self.remove_user_record(&user.id).await?;
        log::info!(
            "Deleted user '{}' and {} authored message(s)",
            user.name,
            authored.len()
        );
        Ok(())
    }

    async fn delete_message(&self, id: &Id) -> StoreResult<()> {
        let message = self.get_message_by_id(id).await?;
        self.delete_messages(std::slice::from_ref(&message.id)).await
    }

    /// Bulk variant: strip the ids from every log, then drop the records.
    async fn delete_messages(&self, ids: &[Id]) -> StoreResult<()> {
        self.pull_messages_from_logs(ids).await?;
        self.remove_message_records(ids).await
    }
}
