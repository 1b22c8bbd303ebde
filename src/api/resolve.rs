//! Resolvers turn lookup keys from the path or body into loaded entities.

use itertools::Itertools;

use crate::api::error::{ApiError, ApiResult};
use crate::api::pipeline::RequestContext;
use crate::model::{Log, Message, RefId, User};
use crate::store::{Store, StoreError};

/// Result of a multi-key lookup: what matched, and which keys did not.
#[derive(Debug)]
pub struct Lookup<T> {
    pub found: Vec<T>,
    pub missing: Vec<String>,
}

impl<T> Lookup<T> {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

fn missing_entity(ctx: &RequestContext, key: &str, entity: &str) -> ApiError {
    ctx.not_found(format!(
        "{key} isn't an existing {entity} ({} {}).",
        ctx.method, ctx.path
    ))
}

/// A 404 naming every unresolved key of a multi-key lookup
pub fn missing_entities(ctx: &RequestContext, keys: &[String], entity: &str) -> ApiError {
    match keys {
        [key] => missing_entity(ctx, key, entity),
        _ => ctx.not_found(format!(
            "{} aren't existing {entity}s ({} {}).",
            keys.join(", "),
            ctx.method,
            ctx.path
        )),
    }
}

pub async fn user_by_name<S: Store>(store: &S, ctx: &RequestContext, name: &str) -> ApiResult<User> {
    match store.get_user_by_name(name).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound { .. }) => Err(missing_entity(ctx, name, "user")),
        Err(err) => Err(ctx.store_error(err)),
    }
}

/// `token` is the raw path segment; anything that is not a refId cannot match.
pub async fn message_by_ref_id<S: Store>(
    store: &S,
    ctx: &RequestContext,
    token: &str,
) -> ApiResult<Message> {
    let Ok(ref_id) = token.parse::<RefId>() else {
        return Err(missing_entity(ctx, token, "message"));
    };

    match store.get_message_by_ref_id(ref_id).await {
        Ok(message) => Ok(message),
        Err(StoreError::NotFound { .. }) => Err(missing_entity(ctx, token, "message")),
        Err(err) => Err(ctx.store_error(err)),
    }
}

pub async fn log_by_name<S: Store>(store: &S, ctx: &RequestContext, name: &str) -> ApiResult<Log> {
    match store.get_log_by_name(name).await {
        Ok(log) => Ok(log),
        Err(StoreError::NotFound { .. }) => Err(missing_entity(ctx, name, "log")),
        Err(err) => Err(ctx.store_error(err)),
    }
}

pub async fn users_by_name<S: Store>(
    store: &S,
    ctx: &RequestContext,
    names: &[String],
) -> ApiResult<Lookup<User>> {
    let names: Vec<String> = names.iter().unique().cloned().collect();
    let found = store
        .get_users_by_name(&names)
        .await
        .map_err(|err| ctx.store_error(err))?;

    let missing = names
        .into_iter()
        .filter(|name| !found.iter().any(|user| &user.name == name))
        .collect();
    Ok(Lookup { found, missing })
}

pub async fn messages_by_ref_id<S: Store>(
    store: &S,
    ctx: &RequestContext,
    ref_ids: &[RefId],
) -> ApiResult<Lookup<Message>> {
    let ref_ids: Vec<RefId> = ref_ids.iter().copied().unique().collect();
    let found = store
        .get_messages_by_ref_id(&ref_ids)
        .await
        .map_err(|err| ctx.store_error(err))?;

    let missing = ref_ids
        .into_iter()
        .filter(|ref_id| !found.iter().any(|message| &message.ref_id == ref_id))
        .map(|ref_id| ref_id.to_string())
        .collect();
    Ok(Lookup { found, missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::Allow;
    use crate::store::{MemoryStore, MessageStore, UserStore};
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};

    fn context(path: &'static str) -> RequestContext {
        RequestContext::new(
            Allow::ITEM,
            Method::GET,
            &Uri::from_static(path),
            HeaderMap::new(),
            Bytes::new(),
        )
    }

    #[tokio::test]
    async fn test_missing_user_embeds_key_and_path() {
        let store = MemoryStore::new();
        let ctx = context("/api/v1/users/ghost");

        let err = user_by_name(&store, &ctx, "ghost").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.to_string(),
            "ghost isn't an existing user (GET /api/v1/users/ghost)."
        );
    }

    #[tokio::test]
    async fn test_non_numeric_ref_id_is_not_found() {
        let store = MemoryStore::new();
        let ctx = context("/api/v1/messages/abc");

        let err = message_by_ref_id(&store, &ctx, "abc").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_multi_lookup_reports_missing_keys() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice").await.unwrap();
        store.create_message(&alice.id, "hi").await.unwrap();
        let ctx = context("/api/v1/logs");

        let users = users_by_name(
            &store,
            &ctx,
            &["alice".to_string(), "ghost".to_string(), "alice".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(users.found.len(), 1);
        assert_eq!(users.missing, vec!["ghost"]);
        assert!(!users.is_complete());

        let messages = messages_by_ref_id(&store, &ctx, &[1, 1]).await.unwrap();
        assert!(messages.is_complete());
        assert_eq!(messages.found.len(), 1);
    }
}
