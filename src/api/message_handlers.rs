use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, Method},
    response::Response,
};

use crate::api::error::{Allow, ApiResult};
use crate::api::hal::{self, paths, Links, MessageFields, Resource};
use crate::api::handlers::AppState;
use crate::api::pipeline::RequestContext;
use crate::api::resolve;
use crate::store::Store;

/// `/api/v1/messages`
pub async fn messages_collection<S: Store>(
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
        Method::GET => list_messages(store.as_ref(), &ctx).await,
        _ => create_message(store.as_ref(), &ctx).await,
    }
}

/// `/api/v1/messages/:ref_id`
pub async fn message_item<S: Store>(
    State(store): State<AppState<S>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Path(ref_id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let ctx = RequestContext::new(Allow::ITEM, method, &uri, headers, body);
    ctx.check_method()?;

    match ctx.method {
        Method::OPTIONS => Ok(ctx.options()),
        Method::HEAD => {
            ctx.check_accept()?;
            resolve::message_by_ref_id(store.as_ref(), &ctx, &ref_id).await?;
            Ok(ctx.head())
        }
        Method::GET => show_message(store.as_ref(), &ctx, &ref_id).await,
        Method::PUT => update_message(store.as_ref(), &ctx, &ref_id).await,
        _ => delete_message(store.as_ref(), &ctx, &ref_id).await,
    }
}

async fn list_messages<S: Store>(store: &S, ctx: &RequestContext) -> ApiResult<Response> {
    ctx.check_accept()?;
    let messages = store
        .list_messages()
        .await
        .map_err(|err| ctx.store_error(err))?;

    let resource = Resource::links_only(
        Links::to(paths::messages())
            .items(messages.iter().map(|message| paths::message(message.ref_id))),
    );
    hal::ok(ctx.allow, &resource)
}

async fn create_message<S: Store>(store: &S, ctx: &RequestContext) -> ApiResult<Response> {
    ctx.check_content_type()?;
    let body = ctx.json_body()?;
    body.require(&["user", "text"])?;
    let author_name = body.required_string("user")?;
    let text = body.required_string("text")?;

    let author = resolve::user_by_name(store, ctx, &author_name).await?;
    let message = store
        .create_message(&author.id, &text)
        .await
        .map_err(|err| ctx.store_error(err))?;
    log::info!("Created message {} by '{}'", message.ref_id, author.name);

    Ok(hal::created(paths::message(message.ref_id)))
}

async fn show_message<S: Store>(store: &S, ctx: &RequestContext, ref_id: &str) -> ApiResult<Response> {
    ctx.check_accept()?;
    let message = resolve::message_by_ref_id(store, ctx, ref_id).await?;
    let author = store
        .get_user_by_id(&message.author_id)
        .await
        .map_err(|err| ctx.store_error(err))?;
    let logs = store.list_logs().await.map_err(|err| ctx.store_error(err))?;

    let related = std::iter::once(paths::messages()).chain(
        logs.iter()
            .filter(|log| log.references_message(&message.id))
            .map(|log| paths::log(&log.name)),
    );
    let links = Links::to(paths::message(message.ref_id))
        .collection(paths::messages())
        .author(paths::user(&author.name))
        .related(related);
    let fields = MessageFields {
        ref_id: message.ref_id,
        user: author.name,
        text: message.text,
        created_at: message.created_at,
    };
    hal::ok(ctx.allow, &Resource::new(links, fields))
}

/// Partial update of `user` (author, by name) and `text`.
async fn update_message<S: Store>(
    store: &S,
    ctx: &RequestContext,
    ref_id: &str,
) -> ApiResult<Response> {
    ctx.check_content_type()?;
    let body = ctx.json_body()?;
    let author_name = body.string("user")?;
    let text = body.string("text")?;
    let message = resolve::message_by_ref_id(store, ctx, ref_id).await?;

    let author = match author_name {
        Some(name) => Some(resolve::user_by_name(store, ctx, &name).await?),
        None => None,
    };

    if let Some(author) = author {
        store
            .update_message_author(&message.id, &author.id)
            .await
            .map_err(|err| ctx.store_error(err))?;
        log::info!("Reassigned message {} to '{}'", message.ref_id, author.name);
    }
    if let Some(text) = text {
        store
            .update_message_text(&message.id, &text)
            .await
            .map_err(|err| ctx.store_error(err))?;
        log::info!("Updated text of message {}", message.ref_id);
    }

    Ok(hal::updated(paths::message(message.ref_id)))
}

async fn delete_message<S: Store>(
    store: &S,
    ctx: &RequestContext,
    ref_id: &str,
) -> ApiResult<Response> {
    let message = resolve::message_by_ref_id(store, ctx, ref_id).await?;
    store
        .delete_message(&message.id)
        .await
        .map_err(|err| ctx.store_error(err))?;
    log::info!("Deleted message {}", message.ref_id);

    Ok(hal::deleted())
}
