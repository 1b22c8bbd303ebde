//! Media-type negotiation for the single representation this API serves.
//!
//! `Accept` handling follows the usual precedence rules: for each representation
//! the most specific matching media range wins (`type/subtype` over `type/*` over
//! `*/*`), and a representation is acceptable when that range has `q > 0`. A bare
//! `json` token is read as `application/json`.

use axum::http::{header, HeaderMap};

pub const HAL_JSON: &str = "application/hal+json";

/// Media types the API can produce and consume, in preference order.
const REPRESENTATIONS: [(&str, &str); 2] = [("application", "hal+json"), ("application", "json")];

#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    q: f32,
}

impl MediaRange {
    fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(';');
        let essence = parts.next()?.trim().to_ascii_lowercase();
        if essence.is_empty() {
            return None;
        }

        let (kind, subtype) = match essence.split_once('/') {
            Some((kind, subtype)) => (kind.trim().to_string(), subtype.trim().to_string()),
            None if essence == "json" => ("application".to_string(), "json".to_string()),
            None => return None,
        };

        let mut q = 1.0;
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                if key.trim().eq_ignore_ascii_case("q") {
                    q = value.trim().parse().unwrap_or(0.0);
                }
            }
        }

        Some(Self { kind, subtype, q })
    }

    /// 2 for an exact match, 1 for `type/*`, 0 for `*/*`
    fn specificity(&self, kind: &str, subtype: &str) -> Option<u8> {
        match (self.kind.as_str(), self.subtype.as_str()) {
            ("*", "*") => Some(0),
            (k, "*") if k == kind => Some(1),
            (k, s) if k == kind && s == subtype => Some(2),
            _ => None,
        }
    }
}

fn header_values<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> impl Iterator<Item = &'a str> {
    headers
        .get_all(name)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
}

/// Whether the client's `Accept` header admits `application/hal+json` or one of
/// its compatible types. A missing header accepts anything.
pub fn accepts_hal(headers: &HeaderMap) -> bool {
    if !headers.contains_key(header::ACCEPT) {
        return true;
    }

    let ranges: Vec<MediaRange> = header_values(headers, header::ACCEPT)
        .flat_map(|value| value.split(','))
        .filter_map(MediaRange::parse)
        .collect();

    REPRESENTATIONS.iter().any(|(kind, subtype)| {
        ranges
            .iter()
            .filter_map(|range| range.specificity(kind, subtype).map(|s| (s, range.q)))
            .max_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)))
            .map_or(false, |(_, q)| q > 0.0)
    })
}

/// Whether the request body is declared as one of the accepted JSON types.
pub fn is_hal_content(headers: &HeaderMap) -> bool {
    header_values(headers, header::CONTENT_TYPE)
        .next()
        .and_then(|value| value.split(';').next())
        .map(|essence| essence.trim().to_ascii_lowercase())
        .map_or(false, |essence| {
            REPRESENTATIONS
                .iter()
                .any(|(kind, subtype)| essence == format!("{kind}/{subtype}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with(name: header::HeaderName, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_accept_compatible_types() {
        assert!(accepts_hal(&HeaderMap::new()));
        for accept in [
            "application/hal+json",
            "application/json",
            "json",
            "*/*",
            "application/*",
            "text/html, application/json;q=0.5",
            "APPLICATION/HAL+JSON; charset=utf-8",
        ] {
            assert!(accepts_hal(&with(header::ACCEPT, accept)), "{accept}");
        }
    }

    #[test]
    fn test_accept_incompatible_types() {
        for accept in [
            "text/html",
            "text/*",
            "application/xml",
            "",
            "application/json;q=0, application/hal+json;q=0",
            "*/*;q=0.8, application/json;q=0, application/hal+json;q=0",
        ] {
            assert!(!accepts_hal(&with(header::ACCEPT, accept)), "{accept}");
        }
    }

    #[test]
    fn test_specific_range_overrides_wildcard() {
        // json is excluded but hal+json is still admitted through */*
        assert!(accepts_hal(&with(header::ACCEPT, "*/*, application/json;q=0")));
    }

    #[test]
    fn test_content_type() {
        assert!(is_hal_content(&with(header::CONTENT_TYPE, "application/hal+json")));
        assert!(is_hal_content(&with(header::CONTENT_TYPE, "application/json; charset=utf-8")));
        assert!(!is_hal_content(&with(header::CONTENT_TYPE, "text/plain")));
        assert!(!is_hal_content(&with(header::CONTENT_TYPE, "application/x-www-form-urlencoded")));
        assert!(!is_hal_content(&HeaderMap::new()));
    }
}
