use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, Method},
    response::Response,
};

use crate::api::error::{Allow, ApiResult};
use crate::api::hal::{self, paths, Links, Resource, UserFields};
use crate::api::handlers::AppState;
use crate::api::pipeline::RequestContext;
use crate::api::resolve;
use crate::store::Store;

/// `/api/v1/users`
pub async fn users_collection<S: Store>(
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
        Method::GET => list_users(store.as_ref(), &ctx).await,
        _ => create_user(store.as_ref(), &ctx).await,
    }
}

/// `/api/v1/users/:name`
pub async fn user_item<S: Store>(
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
            resolve::user_by_name(store.as_ref(), &ctx, &name).await?;
            Ok(ctx.head())
        }
        Method::GET => show_user(store.as_ref(), &ctx, &name).await,
        Method::PUT => update_user(store.as_ref(), &ctx, &name).await,
        _ => delete_user(store.as_ref(), &ctx, &name).await,
    }
}

async fn list_users<S: Store>(store: &S, ctx: &RequestContext) -> ApiResult<Response> {
    ctx.check_accept()?;
    let users = store.list_users().await.map_err(|err| ctx.store_error(err))?;

    let resource = Resource::links_only(
        Links::to(paths::users()).items(users.iter().map(|user| paths::user(&user.name))),
    );
    hal::ok(ctx.allow, &resource)
}

async fn create_user<S: Store>(store: &S, ctx: &RequestContext) -> ApiResult<Response> {
    ctx.check_content_type()?;
    let body = ctx.json_body()?;
    let name = body.required_string("name")?;

    let user = store
        .create_user(&name)
        .await
        .map_err(|err| ctx.store_error(err))?;
    log::info!("Created user '{}' ({})", user.name, user.id);

    Ok(hal::created(paths::user(&user.name)))
}

async fn show_user<S: Store>(store: &S, ctx: &RequestContext, name: &str) -> ApiResult<Response> {
    ctx.check_accept()?;
    let user = resolve::user_by_name(store, ctx, name).await?;
    let messages = store
        .list_messages_by_author(&user.id)
        .await
        .map_err(|err| ctx.store_error(err))?;

    let links = Links::to(paths::user(&user.name))
        .collection(paths::users())
        .related(messages.iter().map(|message| paths::message(message.ref_id)));
    let fields = UserFields {
        name: user.name,
        created_at: user.created_at,
    };
    hal::ok(ctx.allow, &Resource::new(links, fields))
}

/// Partial update: only a present `name` changes anything.
async fn update_user<S: Store>(store: &S, ctx: &RequestContext, name: &str) -> ApiResult<Response> {
    ctx.check_content_type()?;
    let body = ctx.json_body()?;
    let new_name = body.string("name")?;
    let user = resolve::user_by_name(store, ctx, name).await?;

    let current_name = match new_name {
        Some(new_name) if new_name != user.name => {
            store
                .update_user_name(&user.id, &new_name)
                .await
                .map_err(|err| ctx.store_error(err))?;
            log::info!("Renamed user '{}' to '{}'", user.name, new_name);
            new_name
        }
        _ => user.name,
    };

    Ok(hal::updated(paths::user(&current_name)))
}

async fn delete_user<S: Store>(store: &S, ctx: &RequestContext, name: &str) -> ApiResult<Response> {
    let user = resolve::user_by_name(store, ctx, name).await?;
    store
        .delete_user(&user.id)
        .await
        .map_err(|err| ctx.store_error(err))?;

    Ok(hal::deleted())
}
