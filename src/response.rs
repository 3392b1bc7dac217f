use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER},
    Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::{ApiError, AuthError, Error, ProtocolError, Result};

const RATE_LIMIT_LIMIT: &str = "x-rate-limit-limit";
const RATE_LIMIT_REMAINING: &str = "x-rate-limit-remaining";
const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";

/// Pre-1.1 status the API used for throttled search and streaming calls.
const ENHANCE_YOUR_CALM: u16 = 420;

#[derive(Debug, Clone)]
pub enum ResponseBody {
    Json(Value),
    /// Raw payload of a non-JSON endpoint, such as a profile image.
    Bytes(Bytes),
}

/// A successful response. Failures never reach this type; they are mapped to
/// [`Error`] as soon as the status is known.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl ResponseEnvelope {
    /// Reads the body of `response` and classifies it.
    pub(crate) async fn read(response: Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(classify_failure(status, &headers, &body));
        }

        let body = if is_json(&headers, &body) {
            if body.iter().all(u8::is_ascii_whitespace) {
                ResponseBody::Json(Value::Null)
            } else {
                ResponseBody::Json(
                    serde_json::from_slice(&body)
                        .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?,
                )
            }
        } else {
            ResponseBody::Bytes(body)
        };
        Ok(ResponseEnvelope {
            status,
            headers,
            body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Rate-limit budget reported alongside the response, if any.
    pub fn rate_limit(&self) -> Option<RateLimitStatus> {
        RateLimitStatus::from_headers(&self.headers)
    }

    pub fn into_json(self) -> Result<Value> {
        match self.body {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Bytes(_) => Err(ProtocolError::InvalidJson(
                "response body is not JSON".to_string(),
            )
            .into()),
        }
    }

    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.into_json()?;
        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidJson(e.to_string()).into())
    }
}

fn is_json(headers: &HeaderMap, body: &[u8]) -> bool {
    match headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(content_type) if content_type.contains("json") => true,
        Some(content_type) if !content_type.starts_with("text/") => false,
        // untyped or text bodies: trust the first significant byte
        _ => matches!(
            body.iter().find(|b| !b.is_ascii_whitespace()),
            Some(b'{') | Some(b'[') | None
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u64,
    pub remaining: u64,
    /// Epoch seconds at which the window resets.
    pub reset_at: u64,
}

impl RateLimitStatus {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        Some(RateLimitStatus {
            limit: header_u64(headers, RATE_LIMIT_LIMIT)?,
            remaining: header_u64(headers, RATE_LIMIT_REMAINING)?,
            reset_at: header_u64(headers, RATE_LIMIT_RESET)?,
        })
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    errors: Vec<ApiError>,
    #[serde(default)]
    error: Option<String>,
}

/// Extracts `{"errors":[{"code","message"}]}` or `{"error":"..."}`; anything
/// else yields an empty list.
pub(crate) fn parse_api_errors(body: &[u8]) -> Vec<ApiError> {
    match serde_json::from_slice::<ErrorPayload>(body) {
        Ok(ErrorPayload { errors, .. }) if !errors.is_empty() => errors,
        Ok(ErrorPayload {
            error: Some(message),
            ..
        }) => vec![ApiError { code: 0, message }],
        _ => Vec::new(),
    }
}

pub(crate) fn classify_failure(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Error {
    let errors = parse_api_errors(body);
    let error = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Auth(AuthError::Rejected { status, errors })
        }
        StatusCode::NOT_FOUND => Error::NotFound { errors },
        StatusCode::TOO_MANY_REQUESTS => rate_limited(status, headers, errors),
        s if s.as_u16() == ENHANCE_YOUR_CALM => rate_limited(status, headers, errors),
        s if s.is_server_error() => Error::Server { status, errors },
        _ => Error::Http { status, errors },
    };
    tracing::warn!(
        status = status.as_u16(),
        code = error.api_errors().first().map(|e| e.code),
        "request failed"
    );
    error
}

fn rate_limited(status: StatusCode, headers: &HeaderMap, errors: Vec<ApiError>) -> Error {
    Error::RateLimited {
        status,
        retry_after: header_u64(headers, RETRY_AFTER.as_str()),
        reset_at: header_u64(headers, RATE_LIMIT_RESET),
        errors,
    }
}

/// One page of a cursored collection (`ids`, `users`, `lists`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct CursoredPage {
    pub items: Vec<Value>,
    pub previous_cursor: Option<String>,
    /// `None` once the last page was reached.
    pub next_cursor: Option<String>,
}

impl CursoredPage {
    pub fn from_json(mut value: Value, items_key: &str) -> Result<Self> {
        let items = match value.get_mut(items_key).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => return Err(ProtocolError::MissingField(items_key.to_string()).into()),
        };
        Ok(CursoredPage {
            items,
            previous_cursor: cursor(&value, "previous_cursor"),
            next_cursor: cursor(&value, "next_cursor"),
        })
    }

    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Prefers the `*_str` form, which survives 64-bit ids; `0` ends the walk.
fn cursor(value: &Value, key: &str) -> Option<String> {
    let raw = match value.get(format!("{}_str", key)) {
        Some(Value::String(s)) => s.clone(),
        _ => match value.get(key)? {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => return None,
        },
    };
    if raw.is_empty() || raw == "0" {
        None
    } else {
        Some(raw)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let err = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            &headers(&[("retry-after", "15"), ("x-rate-limit-reset", "1700000000")]),
            br#"{"errors":[{"code":88,"message":"Rate limit exceeded"}]}"#,
        );
        match err {
            Error::RateLimited {
                status,
                retry_after,
                reset_at,
                errors,
            } => {
                assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(retry_after, Some(15));
                assert_eq!(reset_at, Some(1_700_000_000));
                assert_eq!(errors[0].code, 88);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn status_classes() {
        let empty = HeaderMap::new();
        assert!(classify_failure(StatusCode::UNAUTHORIZED, &empty, b"").is_auth());
        assert!(classify_failure(StatusCode::FORBIDDEN, &empty, b"").is_auth());
        assert!(matches!(
            classify_failure(StatusCode::NOT_FOUND, &empty, b""),
            Error::NotFound { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, &empty, b"<html>"),
            Error::Server { .. }
        ));
        let calm = classify_failure(StatusCode::from_u16(420).unwrap(), &empty, b"");
        assert!(matches!(calm, Error::RateLimited { retry_after: None, .. }));
        assert_eq!(calm.status().map(|s| s.as_u16()), Some(420));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, &empty, b""),
            Error::Http { .. }
        ));
    }

    #[test]
    fn api_error_payload_shapes() {
        assert_eq!(
            parse_api_errors(br#"{"errors":[{"code":32,"message":"Could not authenticate you."}]}"#),
            vec![ApiError {
                code: 32,
                message: "Could not authenticate you.".to_string()
            }]
        );
        assert_eq!(
            parse_api_errors(br#"{"error":"Not authorized."}"#)[0].message,
            "Not authorized."
        );
        assert!(parse_api_errors(b"Bad Gateway").is_empty());
    }

    #[test]
    fn rate_limit_status_needs_all_headers() {
        let full = headers(&[
            ("x-rate-limit-limit", "15"),
            ("x-rate-limit-remaining", "14"),
            ("x-rate-limit-reset", "1700000000"),
        ]);
        assert_eq!(
            RateLimitStatus::from_headers(&full),
            Some(RateLimitStatus {
                limit: 15,
                remaining: 14,
                reset_at: 1_700_000_000
            })
        );
        assert_eq!(
            RateLimitStatus::from_headers(&headers(&[("x-rate-limit-limit", "15")])),
            None
        );
    }

    #[test]
    fn json_detection() {
        assert!(is_json(&headers(&[("content-type", "application/json; charset=utf-8")]), b"x"));
        assert!(!is_json(&headers(&[("content-type", "image/png")]), b"{"));
        assert!(is_json(&headers(&[("content-type", "text/plain")]), b" [1]"));
        assert!(!is_json(&HeaderMap::new(), b"oauth_token=a"));
    }

    #[test]
    fn cursored_page() {
        let page = CursoredPage::from_json(
            json!({
                "ids": [1, 2, 3],
                "next_cursor": 1374004777531007833u64,
                "next_cursor_str": "1374004777531007833",
                "previous_cursor": 0,
                "previous_cursor_str": "0"
            }),
            "ids",
        )
        .unwrap();
        assert_eq!(page.items, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(page.next_cursor.as_deref(), Some("1374004777531007833"));
        assert_eq!(page.previous_cursor, None);
        assert!(page.has_next());

        let last = CursoredPage::from_json(json!({"users": [], "next_cursor": 0}), "users").unwrap();
        assert!(!last.has_next());

        assert!(matches!(
            CursoredPage::from_json(json!({"users": []}), "ids"),
            Err(Error::Protocol(ProtocolError::MissingField(_)))
        ));
    }
}
