use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};

use crate::model::{next_ref_id, ordered_set, Id, Log, Message, RefId, User};
use crate::store::error::{StoreError, StoreResult};
use crate::store::traits::{LogStore, MessageStore, Store, UserStore};

/// Schema statements run by [`PostgresStore::migrate`]. The UNIQUE constraints are
/// the authoritative guard for names and refIds, and the author foreign key keeps
/// a message from outliving its user. `seq` preserves insertion order.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        seq BIGSERIAL,
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        seq BIGSERIAL,
        id TEXT PRIMARY KEY,
        ref_id BIGINT NOT NULL UNIQUE,
        author_id TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        text TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS messages_author_id_idx ON messages (author_id)",
    r#"
    CREATE TABLE IF NOT EXISTS logs (
        seq BIGSERIAL,
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        user_ids TEXT[] NOT NULL DEFAULT '{}',
        message_ids TEXT[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the tables and unique constraints if they are missing
    pub async fn migrate(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to run schema migration")?;
        }
        Ok(())
    }

    /// Empty all three tables
    pub async fn drop_all(&self) -> anyhow::Result<()> {
        sqlx::query("TRUNCATE users, messages, logs")
            .execute(&self.pool)
            .await
            .context("Failed to truncate tables")?;
        Ok(())
    }
}

/// Concurrent message inserts can read the same `MAX(ref_id)`; the loser retries.
const REF_ID_ATTEMPTS: usize = 10;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map_or(false, |db_err| db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map_or(false, |db_err| db_err.is_foreign_key_violation())
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

fn message_from_row(row: &PgRow) -> Message {
    Message {
        id: row.get("id"),
        ref_id: row.get("ref_id"),
        author_id: row.get("author_id"),
        text: row.get("text"),
        created_at: row.get("created_at"),
    }
}

fn log_from_row(row: &PgRow) -> Log {
    Log {
        id: row.get("id"),
        name: row.get("name"),
        user_ids: row.get("user_ids"),
        message_ids: row.get("message_ids"),
        created_at: row.get("created_at"),
    }
}

/// Reorder `ANY($1)` results to follow the requested keys.
fn in_request_order<T, K: PartialEq>(rows: Vec<T>, keys: &[K], key_of: impl Fn(&T) -> &K) -> Vec<T> {
    let mut rows: Vec<Option<T>> = rows.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(rows.len());
    for key in keys {
        if let Some(slot) = rows
            .iter_mut()
            .find(|slot| slot.as_ref().map_or(false, |row| key_of(row) == key))
        {
            ordered.extend(slot.take());
        }
    }
    ordered
}

#[async_trait::async_trait]
impl UserStore for PostgresStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM users ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn get_user_by_id(&self, id: &Id) -> StoreResult<User> {
        let row = sqlx::query("SELECT id, name, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        row.as_ref()
            .map(user_from_row)
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn get_users_by_name(&self, names: &[String]) -> StoreResult<Vec<User>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM users WHERE name = ANY($1::text[])")
            .bind(names)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch users by name")?;

        let users = rows.iter().map(user_from_row).collect();
        Ok(in_request_order(users, names, |user| &user.name))
    }

    async fn create_user(&self, name: &str) -> StoreResult<User> {
        if let Some(existing) = self.get_users_by_name(&[name.to_string()]).await?.pop() {
            return Ok(existing);
        }

        let user = User::new(name.to_string());
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, name, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        if inserted.rows_affected() == 0 {
            // Lost a race with a concurrent create of the same name
            return self.get_user_by_name(name).await;
        }
        Ok(user)
    }

    async fn update_user_name(&self, id: &Id, new_name: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET name = $1 WHERE id = $2")
            .bind(new_name)
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(StoreError::not_found("user", id)),
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::conflict("user", new_name)),
            Err(err) => Err(anyhow::Error::new(err).context("Failed to rename user").into()),
        }
    }

    async fn remove_user_record(&self, id: &Id) -> StoreResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageStore for PostgresStore {
    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, ref_id, author_id, text, created_at FROM messages ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list messages")?;

        Ok(rows.iter().map(message_from_row).collect())
    }

    async fn list_messages_by_author(&self, author_id: &Id) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, ref_id, author_id, text, created_at FROM messages WHERE author_id = $1 ORDER BY seq",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list messages by author")?;

        Ok(rows.iter().map(message_from_row).collect())
    }

    async fn get_message_by_id(&self, id: &Id) -> StoreResult<Message> {
        let row = sqlx::query(
            "SELECT id, ref_id, author_id, text, created_at FROM messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch message")?;

        row.as_ref()
            .map(message_from_row)
            .ok_or_else(|| StoreError::not_found("message", id))
    }

    async fn get_messages_by_ref_id(&self, ref_ids: &[RefId]) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, ref_id, author_id, text, created_at FROM messages WHERE ref_id = ANY($1::bigint[])",
        )
        .bind(ref_ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch messages by refId")?;

        let messages = rows.iter().map(message_from_row).collect();
        Ok(in_request_order(messages, ref_ids, |message| &message.ref_id))
    }

    async fn create_message(&self, author_id: &Id, text: &str) -> StoreResult<Message> {
        self.get_user_by_id(author_id).await?;

        let mut attempt = 1;
        loop {
            let current_max: Option<RefId> = sqlx::query_scalar("SELECT MAX(ref_id) FROM messages")
                .fetch_one(&self.pool)
                .await
                .context("Failed to read current refId")?;

            let message = Message::new(next_ref_id(current_max), author_id.clone(), text.to_string());
            let result = sqlx::query(
                r#"
                INSERT INTO messages (id, ref_id, author_id, text, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&message.id)
            .bind(message.ref_id)
            .bind(&message.author_id)
            .bind(&message.text)
            .bind(message.created_at)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => return Ok(message),
                Err(err) if is_unique_violation(&err) && attempt < REF_ID_ATTEMPTS => {
                    log::debug!(
                        "refId {} was taken concurrently (attempt {}), retrying",
                        message.ref_id,
                        attempt
                    );
                    attempt += 1;
                }
                Err(err) if is_foreign_key_violation(&err) => {
                    return Err(StoreError::not_found("user", author_id));
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err).context("Failed to create message").into());
                }
            }
        }
    }

    async fn update_message_text(&self, id: &Id, text: &str) -> StoreResult<()> {
        let done = sqlx::query("UPDATE messages SET text = $1 WHERE id = $2")
            .bind(text)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update message text")?;

        if done.rows_affected() == 0 {
            return Err(StoreError::not_found("message", id));
        }
        Ok(())
    }

    async fn update_message_author(&self, id: &Id, author_id: &Id) -> StoreResult<()> {
        self.get_user_by_id(author_id).await?;

        let result = sqlx::query("UPDATE messages SET author_id = $1 WHERE id = $2")
            .bind(author_id)
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(StoreError::not_found("message", id)),
            Ok(_) => Ok(()),
            Err(err) if is_foreign_key_violation(&err) => Err(StoreError::not_found("user", author_id)),
            Err(err) => Err(anyhow::Error::new(err)
                .context("Failed to update message author")
                .into()),
        }
    }

    async fn remove_message_records(&self, ids: &[Id]) -> StoreResult<()> {
        sqlx::query("DELETE FROM messages WHERE id = ANY($1::text[])")
            .bind(ids)
            .execute(&self.pool)
            .await
            .context("Failed to delete messages")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LogStore for PostgresStore {
    async fn list_logs(&self) -> StoreResult<Vec<Log>> {
        let rows = sqlx::query(
            "SELECT id, name, user_ids, message_ids, created_at FROM logs ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list logs")?;

        Ok(rows.iter().map(log_from_row).collect())
    }

    async fn get_log_by_id(&self, id: &Id) -> StoreResult<Log> {
        let row = sqlx::query(
            "SELECT id, name, user_ids, message_ids, created_at FROM logs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch log")?;

        row.as_ref()
            .map(log_from_row)
            .ok_or_else(|| StoreError::not_found("log", id))
    }

    async fn get_logs_by_name(&self, names: &[String]) -> StoreResult<Vec<Log>> {
        let rows = sqlx::query(
            "SELECT id, name, user_ids, message_ids, created_at FROM logs WHERE name = ANY($1::text[])",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch logs by name")?;

        let logs = rows.iter().map(log_from_row).collect();
        Ok(in_request_order(logs, names, |log| &log.name))
    }

    async fn create_log(
        &self,
        user_ids: &[Id],
        message_ids: &[Id],
        name: &str,
    ) -> StoreResult<Log> {
        if let Some(existing) = self.get_logs_by_name(&[name.to_string()]).await?.pop() {
            return Ok(existing);
        }

        let log = Log::new(name.to_string(), user_ids.to_vec(), message_ids.to_vec());
        let inserted = sqlx::query(
            r#"
            INSERT INTO logs (id, name, user_ids, message_ids, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&log.id)
        .bind(&log.name)
        .bind(&log.user_ids)
        .bind(&log.message_ids)
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create log")?;

        if inserted.rows_affected() == 0 {
            return self.get_log_by_name(name).await;
        }
        Ok(log)
    }

    async fn update_log_name(&self, id: &Id, new_name: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE logs SET name = $1 WHERE id = $2")
            .bind(new_name)
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(StoreError::not_found("log", id)),
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::conflict("log", new_name)),
            Err(err) => Err(anyhow::Error::new(err).context("Failed to rename log").into()),
        }
    }

    async fn update_log_users(&self, id: &Id, user_ids: &[Id]) -> StoreResult<()> {
        let done = sqlx::query("UPDATE logs SET user_ids = $1 WHERE id = $2")
            .bind(ordered_set(user_ids.to_vec()))
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update log users")?;

        if done.rows_affected() == 0 {
            return Err(StoreError::not_found("log", id));
        }
        Ok(())
    }

    async fn update_log_messages(&self, id: &Id, message_ids: &[Id]) -> StoreResult<()> {
        let done = sqlx::query("UPDATE logs SET message_ids = $1 WHERE id = $2")
            .bind(ordered_set(message_ids.to_vec()))
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update log messages")?;

        if done.rows_affected() == 0 {
            return Err(StoreError::not_found("log", id));
        }
        Ok(())
    }

    async fn pull_user_from_logs(&self, user_id: &Id) -> StoreResult<()> {
        sqlx::query(
            "UPDATE logs SET user_ids = array_remove(user_ids, $1) WHERE $1 = ANY(user_ids)",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to remove user from logs")?;
        Ok(())
    }

    async fn pull_messages_from_logs(&self, message_ids: &[Id]) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE logs SET message_ids = ARRAY(
                SELECT m FROM unnest(message_ids) WITH ORDINALITY AS t(m, ord)
                WHERE NOT (m = ANY($1::text[]))
                ORDER BY ord
            )
            WHERE message_ids && $1::text[]
            "#,
        )
        .bind(message_ids)
        .execute(&self.pool)
        .await
        .context("Failed to remove messages from logs")?;
        Ok(())
    }

    async fn delete_log(&self, id: &Id) -> StoreResult<()> {
        let done = sqlx::query("DELETE FROM logs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete log")?;

        if done.rows_affected() == 0 {
            return Err(StoreError::not_found("log", id));
        }
        Ok(())
    }
}

impl Store for PostgresStore {}
