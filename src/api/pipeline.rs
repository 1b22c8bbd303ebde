//! Per-request context and the negotiation / validation stages every route runs.
//!
//! A route handler builds one [`RequestContext`] and walks it through
//! `check_method → check_accept | check_content_type → json_body → field checks`,
//! stopping at the first stage that returns an [`ApiError`].

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use crate::api::error::{Allow, ApiError, ApiResult};
use crate::api::negotiate::{self, HAL_JSON};
use crate::model::RefId;
use crate::store::StoreError;

#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub allow: Allow,
    body: Bytes,
}

impl RequestContext {
    pub fn new(allow: Allow, method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            path: uri.path().to_string(),
            headers,
            allow,
            body,
        }
    }

    pub fn check_method(&self) -> ApiResult<()> {
        if self.allow.permits(&self.method) {
            return Ok(());
        }
        Err(ApiError::MethodNotAllowed {
            method: self.method.clone(),
            path: self.path.clone(),
            allow: self.allow,
        })
    }

    pub fn check_accept(&self) -> ApiResult<()> {
        if negotiate::accepts_hal(&self.headers) {
            return Ok(());
        }
        Err(ApiError::NotAcceptable { allow: self.allow })
    }

    pub fn check_content_type(&self) -> ApiResult<()> {
        if negotiate::is_hal_content(&self.headers) {
            return Ok(());
        }
        Err(ApiError::UnsupportedMediaType { allow: self.allow })
    }

    /// Parse the request body, which must be a JSON object. An empty body reads as `{}`.
    pub fn json_body(&self) -> ApiResult<JsonBody<'_>> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody {
                ctx: self,
                fields: Map::new(),
            });
        }

        match serde_json::from_slice::<Value>(&self.body) {
            Ok(Value::Object(fields)) => Ok(JsonBody { ctx: self, fields }),
            Ok(_) => Err(ApiError::UnsupportedMediaType { allow: self.allow }),
            Err(err) => {
                log::debug!("Malformed JSON body on {} {}: {}", self.method, self.path, err);
                Err(self.bad_request(format!(
                    "Your {} request to {} has a malformed JSON body.",
                    self.method, self.path
                )))
            }
        }
    }

    /// `OPTIONS` only reports the legal method set
    pub fn options(&self) -> Response {
        (StatusCode::OK, [(header::ALLOW, self.allow.to_string())]).into_response()
    }

    /// `HEAD` answers with the headers a `GET` would carry and no body
    pub fn head(&self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HAL_JSON.to_string()),
                (header::ALLOW, self.allow.to_string()),
            ],
        )
            .into_response()
    }

    pub fn bad_request(&self, message: String) -> ApiError {
        ApiError::BadRequest {
            message,
            allow: self.allow,
        }
    }

    pub fn not_found(&self, message: String) -> ApiError {
        ApiError::NotFound {
            message,
            allow: self.allow,
        }
    }

    pub fn store_error(&self, err: StoreError) -> ApiError {
        ApiError::from_store(err, self.allow)
    }
}

/// A parsed JSON object body with field checks that report against the request.
#[derive(Debug)]
pub struct JsonBody<'a> {
    ctx: &'a RequestContext,
    fields: Map<String, Value>,
}

impl<'a> JsonBody<'a> {
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Fail with 400 naming the first listed field that is absent
    pub fn require(&self, fields: &[&str]) -> ApiResult<()> {
        match fields.iter().find(|field| !self.contains(field)) {
            Some(field) => Err(self.ctx.bad_request(format!(
                "Your {} request to {} is missing a \"{}\" property in the body.",
                self.ctx.method, self.ctx.path, field
            ))),
            None => Ok(()),
        }
    }

    pub fn string(&self, field: &str) -> ApiResult<Option<String>> {
        match self.fields.get(field) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(self.type_error(field, "a JSON string")),
        }
    }

    pub fn required_string(&self, field: &str) -> ApiResult<String> {
        self.require(&[field])?;
        Ok(self.string(field)?.unwrap_or_default())
    }

    pub fn array(&self, field: &str) -> ApiResult<Option<&Vec<Value>>> {
        match self.fields.get(field) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(self.type_error(field, "a JSON array")),
        }
    }

    /// An array of user or log names
    pub fn names(&self, field: &str) -> ApiResult<Option<Vec<String>>> {
        let Some(items) = self.array(field)? else {
            return Ok(None);
        };
        items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Some)
            .ok_or_else(|| self.type_error(field, "a JSON array of names"))
    }

    /// An array of message refIds, given as integers or numeric strings
    pub fn ref_ids(&self, field: &str) -> ApiResult<Option<Vec<RefId>>> {
        let Some(items) = self.array(field)? else {
            return Ok(None);
        };
        items
            .iter()
            .map(parse_ref_id)
            .collect::<Option<Vec<_>>>()
            .map(Some)
            .ok_or_else(|| self.type_error(field, "a JSON array of message refIds"))
    }

    fn type_error(&self, field: &str, expected: &str) -> ApiError {
        self.ctx.bad_request(format!(
            "The \"{}\" property in your {} request body should be {}.",
            field, self.ctx.method, expected
        ))
    }
}

pub fn parse_ref_id(value: &Value) -> Option<RefId> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn context(method: Method, body: &'static str) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        RequestContext::new(
            Allow::COLLECTION,
            method,
            &Uri::from_static("/api/v1/logs"),
            headers,
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn test_method_check_reports_allow() {
        let ctx = context(Method::DELETE, "");
        let err = ctx.check_method().unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.allow(), Some(Allow::COLLECTION));
        assert!(context(Method::POST, "").check_method().is_ok());
    }

    #[test]
    fn test_body_must_be_object() {
        let ctx = context(Method::POST, "[1, 2]");
        assert_eq!(
            ctx.json_body().unwrap_err().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );

        let ctx = context(Method::POST, "{not json");
        assert_eq!(ctx.json_body().unwrap_err().status(), StatusCode::BAD_REQUEST);

        let ctx = context(Method::POST, "  ");
        assert!(!ctx.json_body().unwrap().contains("name"));
    }

    #[test]
    fn test_missing_field_names_field_path_and_method() {
        let ctx = context(Method::POST, r#"{"name": "standup", "users": []}"#);
        let body = ctx.json_body().unwrap();

        let err = body.require(&["name", "users", "messages"]).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Your POST request to /api/v1/logs is missing a \"messages\" property in the body."
        );
    }

    #[test]
    fn test_array_fields() {
        let ctx = context(Method::PUT, r#"{"users": "bob", "messages": [1, "2"]}"#);
        let body = ctx.json_body().unwrap();

        let err = body.names("users").unwrap_err();
        assert_eq!(
            err.to_string(),
            "The \"users\" property in your PUT request body should be a JSON array."
        );
        assert_eq!(body.ref_ids("messages").unwrap(), Some(vec![1, 2]));
        assert_eq!(body.names("absent").unwrap(), None);
    }

    #[test]
    fn test_parse_ref_id() {
        assert_eq!(parse_ref_id(&json!(7)), Some(7));
        assert_eq!(parse_ref_id(&json!("12")), Some(12));
        assert_eq!(parse_ref_id(&json!("twelve")), None);
        assert_eq!(parse_ref_id(&json!(1.5)), None);
    }
}
