use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, Method},
    response::Response,
};

use crate::api::error::{Allow, ApiResult};
use crate::api::hal::{self, paths, Links, LogFields, Resource};
use crate::api::handlers::AppState;
use crate::api::pipeline::RequestContext;
use crate::api::resolve;
use crate::model::{Id, Log};
use crate::store::{Store, StoreError};

/// `/api/v1/logs`
pub async fn logs_collection<S: Store>(
    State(store): State<AppState<S>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let ctx = RequestContext::new(Allow::COLLECTION, method, &uri, headers, body);
    ctx.check_method()?;

    match ctx.method {
        Method::OPTIONS => Ok(ctx.options()),
        Method::HEAD => {
            ctx.check_accept()?;
            Ok(ctx.head())
        }
        Method::GET => list_logs(store.as_ref(), &ctx).await,
        _ => create_log(store.as_ref(), &ctx).await,
    }
}

/// `/api/v1/logs/:name`
pub async fn log_item<S: Store>(
    State(store): State<AppState<S>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let ctx = RequestContext::new(Allow::ITEM, method, &uri, headers, body);
    ctx.check_method()?;

    match ctx.method {
        Method::OPTIONS => Ok(ctx.options()),
        Method::HEAD => {
            ctx.check_accept()?;
            resolve::log_by_name(store.as_ref(), &ctx, &name).await?;
            Ok(ctx.head())
        }
        Method::GET => show_log(store.as_ref(), &ctx, &name).await,
        Method::PUT => update_log(store.as_ref(), &ctx, &name).await,
        _ => delete_log(store.as_ref(), &ctx, &name).await,
    }
}

async fn list_logs<S: Store>(store: &S, ctx: &RequestContext) -> ApiResult<Response> {
    ctx.check_accept()?;
    let logs = store.list_logs().await.map_err(|err| ctx.store_error(err))?;

    let resource = Resource::links_only(
        Links::to(paths::logs()).items(logs.iter().map(|entry| paths::log(&entry.name))),
    );
    hal::ok(ctx.allow, &resource)
}

async fn create_log<S: Store>(store: &S, ctx: &RequestContext) -> ApiResult<Response> {
    ctx.check_content_type()?;
    let body = ctx.json_body()?;
    body.require(&["name", "users", "messages"])?;
    let name = body.required_string("name")?;
    let user_names = body.names("users")?.unwrap_or_default();
    let ref_ids = body.ref_ids("messages")?.unwrap_or_default();

    let messages = resolve::messages_by_ref_id(store, ctx, &ref_ids).await?;
    if !messages.is_complete() {
        return Err(resolve::missing_entities(ctx, &messages.missing, "message"));
    }
    let users = resolve::users_by_name(store, ctx, &user_names).await?;
    if !users.is_complete() {
        return Err(resolve::missing_entities(ctx, &users.missing, "user"));
    }

    let user_ids: Vec<Id> = users.found.into_iter().map(|user| user.id).collect();
    let message_ids: Vec<Id> = messages.found.into_iter().map(|message| message.id).collect();
    let created = store
        .create_log(&user_ids, &message_ids, &name)
        .await
        .map_err(|err| ctx.store_error(err))?;
    log::info!(
        "Created log '{}' with {} user(s) and {} message(s)",
        created.name,
        created.user_ids.len(),
        created.message_ids.len()
    );

    Ok(hal::created(paths::log(&created.name)))
}

async fn show_log<S: Store>(store: &S, ctx: &RequestContext, name: &str) -> ApiResult<Response> {
    ctx.check_accept()?;
    let entry = resolve::log_by_name(store, ctx, name).await?;
    let users = store.list_users().await.map_err(|err| ctx.store_error(err))?;
    let messages = store
        .list_messages()
        .await
        .map_err(|err| ctx.store_error(err))?;

    // Follow the log's own ordering; ids without a live record are skipped
    let user_names: Vec<String> = entry
        .user_ids
        .iter()
        .filter_map(|id| users.iter().find(|user| &user.id == id))
        .map(|user| user.name.clone())
        .collect();
    let ref_ids: Vec<_> = entry
        .message_ids
        .iter()
        .filter_map(|id| messages.iter().find(|message| &message.id == id))
        .map(|message| message.ref_id)
        .collect();

    let related = user_names
        .iter()
        .map(|user_name| paths::user(user_name))
        .chain(ref_ids.iter().map(|ref_id| paths::message(*ref_id)));
    let links = Links::to(paths::log(&entry.name))
        .collection(paths::logs())
        .related(related);
    let fields = LogFields {
        name: entry.name,
        users: user_names,
        messages: ref_ids,
        created_at: entry.created_at,
    };
    hal::ok(ctx.allow, &Resource::new(links, fields))
}

/// Partial update. Every present field is validated and resolved before the
/// first write, and `users` / `messages` replace the stored sets.
async fn update_log<S: Store>(store: &S, ctx: &RequestContext, name: &str) -> ApiResult<Response> {
    ctx.check_content_type()?;
    let body = ctx.json_body()?;
    let new_name = body.string("name")?;
    let user_names = body.names("users")?;
    let ref_ids = body.ref_ids("messages")?;
    let entry = resolve::log_by_name(store, ctx, name).await?;
    if let Some(new_name) = new_name.as_deref().filter(|new_name| *new_name != entry.name) {
        let taken = store
            .get_logs_by_name(&[new_name.to_string()])
            .await
            .map_err(|err| ctx.store_error(err))?;
        if !taken.is_empty() {
            return Err(ctx.store_error(StoreError::conflict("log", new_name)));
        }
    }

    let user_ids = match user_names {
        Some(names) => {
            let users = resolve::users_by_name(store, ctx, &names).await?;
            if !users.is_complete() {
                return Err(ctx.bad_request(format!(
                    "Invalid user names in {} request body.",
                    ctx.method
                )));
            }
            Some(users.found.into_iter().map(|user| user.id).collect::<Vec<_>>())
        }
        None => None,
    };
    let message_ids = match ref_ids {
        Some(ref_ids) => {
            let messages = resolve::messages_by_ref_id(store, ctx, &ref_ids).await?;
            if !messages.is_complete() {
                return Err(ctx.bad_request(format!(
                    "Invalid message refIds in {} request body.",
                    ctx.method
                )));
            }
            Some(messages.found.into_iter().map(|message| message.id).collect::<Vec<_>>())
        }
        None => None,
    };

    if let Some(user_ids) = user_ids {
        store
            .update_log_users(&entry.id, &user_ids)
            .await
            .map_err(|err| ctx.store_error(err))?;
    }
    if let Some(message_ids) = message_ids {
        store
            .update_log_messages(&entry.id, &message_ids)
            .await
            .map_err(|err| ctx.store_error(err))?;
    }
    let current_name = rename(store, ctx, &entry, new_name).await?;
    log::info!("Updated log '{}'", current_name);

    Ok(hal::updated(paths::log(&current_name)))
}

async fn rename<S: Store>(
    store: &S,
    ctx: &RequestContext,
    entry: &Log,
    new_name: Option<String>,
) -> ApiResult<String> {
    match new_name {
        Some(new_name) if new_name != entry.name => {
            store
                .update_log_name(&entry.id, &new_name)
                .await
                .map_err(|err| ctx.store_error(err))?;
            Ok(new_name)
        }
        _ => Ok(entry.name.clone()),
    }
}

async fn delete_log<S: Store>(store: &S, ctx: &RequestContext, name: &str) -> ApiResult<Response> {
    let entry = resolve::log_by_name(store, ctx, name).await?;
    store
        .delete_log(&entry.id)
        .await
        .map_err(|err| ctx.store_error(err))?;
    log::info!("Deleted log '{}'", entry.name);

    Ok(hal::deleted())
}
