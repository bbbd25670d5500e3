//! Helpers shared by the route handlers: bodies, JSON, ids, session lookup

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use hyper::{Request, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::error::Error as StdError;
use tracing::{error, warn};

use crate::auth::{self, CurrentUser};
use crate::server::AppState;
use crate::types::{LinkupError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest JSON body accepted
pub const MAX_BODY_BYTES: usize = 10 * 1024;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: &'static str,
}

/// `{"status":"success","message":...}`
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
        }
    }
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Attach a `Set-Cookie` header
pub fn with_cookie(mut response: Response<BoxBody>, cookie: &str) -> Response<BoxBody> {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!(error = %e, "Refusing to send malformed cookie"),
    }
    response
}

/// Render an error as `{message, code}` with its status code.
///
/// Server-side failures are logged with their detail and reported generically.
pub fn error_response(err: &LinkupError) -> Response<BoxBody> {
    let status = err.status_code();
    let message = match err {
        LinkupError::Database(_) => {
            error!(error = %err, "Store failure");
            "Service temporarily unavailable".to_string()
        }
        LinkupError::Config(_) | LinkupError::Internal(_) | LinkupError::Email(_) => {
            error!(error = %err, "Request failed");
            "Internal server error".to_string()
        }
        _ => {
            warn!(status = status.as_u16(), error = %err, "Request rejected");
            err.to_string()
        }
    };

    json_response(
        status,
        &ErrorResponse {
            message,
            code: err.code(),
        },
    )
}

pub fn not_found_response(path: &str) -> Response<BoxBody> {
    error_response(&LinkupError::NotFound(format!("Route {} not found", path)))
}

/// Read and decode the JSON body of a request
pub async fn parse_json_body<T, B>(req: Request<B>) -> Result<T>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    read_json(req.into_body()).await
}

/// Read and decode a JSON body of at most [`MAX_BODY_BYTES`]
pub async fn read_json<T, B>(body: B) -> Result<T>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let body = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<http_body_util::LengthLimitError>() {
                LinkupError::BadRequest("Request body too large".into())
            } else {
                LinkupError::BadRequest(format!("Failed to read body: {}", e))
            }
        })?;

    Ok(serde_json::from_slice(&body.to_bytes())?)
}

/// Parse a hex ObjectId path segment
pub fn parse_id(segment: &str) -> Result<ObjectId> {
    Ok(ObjectId::parse_str(segment)?)
}

pub fn get_auth_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

pub fn get_cookie_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(COOKIE).and_then(|v| v.to_str().ok())
}

/// Resolve the session carried by the request headers
pub async fn current_user(headers: &HeaderMap, state: &AppState) -> Result<CurrentUser> {
    auth::authenticate(
        state.store.as_ref(),
        &state.jwt,
        get_cookie_header(headers),
        get_auth_header(headers),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = ObjectId::new();
        assert_eq!(parse_id(&id.to_hex()).unwrap(), id);
        assert!(matches!(
            parse_id("not-an-id"),
            Err(LinkupError::BadRequest(msg)) if msg == "Invalid id"
        ));
    }

    #[test]
    fn test_error_response_shape() {
        let response = error_response(&LinkupError::AlreadyProcessed);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let response = error_response(&LinkupError::Database("socket closed".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_header_helpers() {
        let req = Request::builder()
            .header(AUTHORIZATION, "Bearer abc")
            .header(COOKIE, "access_token=xyz")
            .body(())
            .unwrap();
        assert_eq!(get_auth_header(req.headers()), Some("Bearer abc"));
        assert_eq!(get_cookie_header(req.headers()), Some("access_token=xyz"));
    }

    #[tokio::test]
    async fn test_read_json_limits() {
        #[derive(Debug, serde::Deserialize)]
        struct Payload {
            content: String,
        }

        let ok: Payload = read_json(Full::new(Bytes::from(r#"{"content":"hi"}"#)))
            .await
            .unwrap();
        assert_eq!(ok.content, "hi");

        let big = format!(r#"{{"content":"{}"}}"#, "x".repeat(MAX_BODY_BYTES));
        let err = read_json::<Payload, _>(Full::new(Bytes::from(big))).await.unwrap_err();
        assert!(matches!(err, LinkupError::BadRequest(msg) if msg == "Request body too large"));

        let err = read_json::<Payload, _>(Full::new(Bytes::from("not json"))).await;
        assert!(err.is_err());
    }
}

/// Route-level test helpers: an app over the memory store and signed-in callers
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use clap::Parser;
    use std::sync::Arc;

    use crate::config::Args;
    use crate::db::schemas::UserDoc;
    use crate::services::LogMailer;
    use crate::store::MemorySocialStore;

    pub fn app() -> Arc<AppState> {
        let args = Args::parse_from(["linkup", "--dev-mode"]);
        let store = Arc::new(MemorySocialStore::new());
        Arc::new(AppState::new(args, store, Arc::new(LogMailer)).unwrap())
    }

    /// Create a user and return its id with headers carrying its bearer token
    pub async fn sign_in(state: &AppState, username: &str) -> (ObjectId, HeaderMap) {
        let id = state
            .store
            .insert_user(UserDoc::new(
                username.to_uppercase(),
                username.into(),
                format!("{}@example.com", username),
                "hash".into(),
            ))
            .await
            .unwrap();
        let token = state.jwt.generate_token(&id.to_hex(), username).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        (id, headers)
    }

    /// A request carrying `headers` and a JSON (or empty) body
    pub fn request(
        method: hyper::Method,
        headers: &HeaderMap,
        body: Option<serde_json::Value>,
    ) -> Request<Full<Bytes>> {
        let bytes = body.map(|b| b.to_string()).unwrap_or_default();
        let mut req = Request::new(Full::new(Bytes::from(bytes)));
        *req.method_mut() = method;
        *req.headers_mut() = headers.clone();
        req
    }

    pub async fn body_json(response: Response<BoxBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
