//! HAL+JSON envelopes and the canonical URLs they link to.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::api::error::{Allow, ApiResult};
use crate::api::negotiate::HAL_JSON;
use crate::model::RefId;

pub const API_ROOT: &str = "/api/v1";

pub mod paths {
    use super::API_ROOT;
    use crate::model::RefId;

    pub fn root() -> String {
        API_ROOT.to_string()
    }

    pub fn users() -> String {
        format!("{API_ROOT}/users")
    }

    pub fn user(name: &str) -> String {
        format!("{API_ROOT}/users/{}", urlencoding::encode(name))
    }

    pub fn messages() -> String {
        format!("{API_ROOT}/messages")
    }

    pub fn message(ref_id: RefId) -> String {
        format!("{API_ROOT}/messages/{ref_id}")
    }

    pub fn logs() -> String {
        format!("{API_ROOT}/logs")
    }

    pub fn log(name: &str) -> String {
        format!("{API_ROOT}/logs/{}", urlencoding::encode(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub href: String,
}

impl Link {
    pub fn new(href: String) -> Self {
        Self { href }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_link: Link,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Vec<Link>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<Vec<Link>>,
}

impl Links {
    pub fn to(href: String) -> Self {
        Self {
            self_link: Link::new(href),
            collection: None,
            item: None,
            author: None,
            related: None,
        }
    }

    pub fn collection(mut self, href: String) -> Self {
        self.collection = Some(Link::new(href));
        self
    }

    pub fn items(mut self, hrefs: impl IntoIterator<Item = String>) -> Self {
        self.item = Some(hrefs.into_iter().map(Link::new).collect());
        self
    }

    pub fn author(mut self, href: String) -> Self {
        self.author = Some(Link::new(href));
        self
    }

    pub fn related(mut self, hrefs: impl IntoIterator<Item = String>) -> Self {
        self.related = Some(hrefs.into_iter().map(Link::new).collect());
        self
    }
}

/// Collections and the API root carry links only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoFields {}

#[derive(Debug, Clone, Serialize)]
pub struct Resource<T: Serialize> {
    #[serde(rename = "_links")]
    pub links: Links,
    #[serde(flatten)]
    pub fields: T,
}

impl<T: Serialize> Resource<T> {
    pub fn new(links: Links, fields: T) -> Self {
        Self { links, fields }
    }
}

impl Resource<NoFields> {
    pub fn links_only(links: Links) -> Self {
        Self::new(links, NoFields {})
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFields {
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFields {
    pub ref_id: RefId,
    pub user: String,
    pub text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFields {
    pub name: String,
    pub users: Vec<String>,
    pub messages: Vec<RefId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// 200 with the HAL body, its media type and the route's `Allow` set
pub fn ok<T: Serialize>(allow: Allow, resource: &Resource<T>) -> ApiResult<Response> {
    let body = serde_json::to_vec(resource).map_err(anyhow::Error::from)?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HAL_JSON.to_string()),
            (header::ALLOW, allow.to_string()),
        ],
        body,
    )
        .into_response())
}

/// 201 pointing at the new resource, empty body
pub fn created(location: String) -> Response {
    (StatusCode::CREATED, [(header::LOCATION, location)]).into_response()
}

/// 200 pointing at the (possibly renamed) resource, empty body
pub fn updated(location: String) -> Response {
    (StatusCode::OK, [(header::LOCATION, location)]).into_response()
}

pub fn deleted() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_envelope() {
        let resource = Resource::links_only(
            Links::to(paths::users()).items(vec![paths::user("alice"), paths::user("bob")]),
        );

        assert_eq!(
            serde_json::to_value(&resource).unwrap(),
            json!({
                "_links": {
                    "self": { "href": "/api/v1/users" },
                    "item": [
                        { "href": "/api/v1/users/alice" },
                        { "href": "/api/v1/users/bob" }
                    ]
                }
            })
        );
    }

    #[test]
    fn test_item_envelope_flattens_fields() {
        let created_at = chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let resource = Resource::new(
            Links::to(paths::user("alice"))
                .collection(paths::users())
                .related(vec![paths::message(3)]),
            UserFields {
                name: "alice".to_string(),
                created_at,
            },
        );

        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["name"], "alice");
        assert_eq!(value["createdAt"], "2024-01-01T00:00:00Z");
        assert_eq!(value["_links"]["collection"]["href"], "/api/v1/users");
        assert_eq!(value["_links"]["related"][0]["href"], "/api/v1/messages/3");
        assert!(value["_links"].get("item").is_none());
    }

    #[test]
    fn test_path_segments_are_encoded() {
        assert_eq!(paths::user("ann lee"), "/api/v1/users/ann%20lee");
        assert_eq!(paths::log("q1/q2"), "/api/v1/logs/q1%2Fq2");
    }

    #[test]
    fn test_created_sets_location() {
        let response = created(paths::message(1));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/api/v1/messages/1"
        );
    }
}
