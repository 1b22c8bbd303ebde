use std::fmt;

use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use itertools::Itertools;
use thiserror::Error;

use crate::store::StoreError;

/// The legal method set of a route, echoed in `Allow` on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allow(&'static [&'static str]);

impl Allow {
    pub const ROOT: Allow = Allow(&["HEAD", "OPTIONS", "GET"]);
    pub const COLLECTION: Allow = Allow(&["HEAD", "OPTIONS", "GET", "POST"]);
    pub const ITEM: Allow = Allow(&["HEAD", "OPTIONS", "GET", "PUT", "DELETE"]);

    pub fn permits(&self, method: &Method) -> bool {
        self.0.contains(&method.as_str())
    }
}

impl fmt::Display for Allow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(", "))
    }
}

/// Every failure a pipeline stage can raise. All variants except `Internal` are
/// intentional client-facing errors: they are translated into their status, the
/// route's `Allow` set and a plain-text message. `Internal` goes to the generic
/// 500 handler and its detail is only logged.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("You cannot {method} {path}. Try {allow} instead.")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allow: Allow,
    },

    #[error("Invalid hypermedia type. Try Accept: \"application/hal+json\" instead.")]
    NotAcceptable { allow: Allow },

    #[error("Invalid hypermedia type in your request. Try Content-Type: \"application/hal+json\" instead.")]
    UnsupportedMediaType { allow: Allow },

    #[error("{message}")]
    BadRequest { message: String, allow: Allow },

    #[error("{message}")]
    NotFound { message: String, allow: Allow },

    #[error("{message}")]
    Conflict { message: String, allow: Allow },

    #[error("The server failed to process your request--likely a database error. Our bad.")]
    Persistence { cause: StoreError, allow: Allow },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            ApiError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Persistence { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Legal methods captured when the error was raised; `None` for internal errors
    pub fn allow(&self) -> Option<Allow> {
        match self {
            ApiError::MethodNotAllowed { allow, .. }
            | ApiError::NotAcceptable { allow }
            | ApiError::UnsupportedMediaType { allow }
            | ApiError::BadRequest { allow, .. }
            | ApiError::NotFound { allow, .. }
            | ApiError::Conflict { allow, .. }
            | ApiError::Persistence { allow, .. } => Some(*allow),
            ApiError::Internal(_) => None,
        }
    }

    pub fn is_intentional(&self) -> bool {
        self.allow().is_some()
    }

    /// Translate a repository failure raised while serving a route
    pub fn from_store(err: StoreError, allow: Allow) -> Self {
        match err {
            StoreError::NotFound { entity, key } => ApiError::NotFound {
                message: format!("{key} isn't an existing {entity}."),
                allow,
            },
            StoreError::Conflict { entity, name } => ApiError::Conflict {
                message: format!("A {entity} named \"{name}\" already exists."),
                allow,
            },
            cause @ StoreError::Backend(_) => ApiError::Persistence { cause, allow },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let Some(allow) = self.allow() else {
            log::error!("Unhandled error: {:#}", self);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };

        match &self {
            ApiError::Persistence { cause, .. } => log::error!("Persistence failure: {:#}", cause),
            other => log::debug!("Rejected request ({}): {}", other.status(), other),
        }

        (
            self.status(),
            [(header::ALLOW, allow.to_string())],
            self.to_string(),
        )
            .into_response()
    }
}
