use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, Method},
    response::Response,
};
use std::sync::Arc;

use crate::api::error::{Allow, ApiResult};
use crate::api::hal::{self, paths, Links, Resource};
use crate::api::pipeline::RequestContext;
use crate::store::Store;

pub type AppState<S> = Arc<S>;

/// `/api/v1`: entry point linking to the three collections
pub async fn api_root<S: Store>(
    State(_store): State<AppState<S>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let ctx = RequestContext::new(Allow::ROOT, method, &uri, headers, body);
    ctx.check_method()?;

    match ctx.method {
        Method::OPTIONS => Ok(ctx.options()),
        Method::HEAD => {
            ctx.check_accept()?;
            Ok(ctx.head())
        }
        _ => {
            ctx.check_accept()?;
            let resource = Resource::links_only(Links::to(paths::root()).related(vec![
                paths::users(),
                paths::messages(),
                paths::logs(),
            ]));
            hal::ok(ctx.allow, &resource)
        }
    }
}
