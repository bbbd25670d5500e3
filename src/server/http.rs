//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection. Every request gets a
//! uuid request id, is routed under the API prefix and leaves with CORS
//! headers for the web client.

use hyper::body::Incoming;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, VARY,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::routes::{self, common::empty_body, BoxBody};
use crate::services::{ConnectionWorkflow, Mailer, NotificationService, PostService};
use crate::store::SocialStore;
use crate::types::{LinkupError, Result};

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Users, connection requests, notifications and posts
    pub store: Arc<dyn SocialStore>,
    pub jwt: JwtValidator,
    pub mailer: Arc<dyn Mailer>,
    pub connections: ConnectionWorkflow,
    pub notifications: NotificationService,
    pub posts: PostService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, store: Arc<dyn SocialStore>, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let secret = args
            .jwt_secret()
            .ok_or_else(|| LinkupError::Config("JWT_SECRET is required".into()))?;
        let jwt = JwtValidator::new(secret, args.jwt_expiry_seconds)?;

        let connections =
            ConnectionWorkflow::new(store.clone(), mailer.clone(), args.frontend_url.clone());
        let notifications = NotificationService::new(store.clone());
        let posts = PostService::new(store.clone());

        Ok(Self {
            args,
            store,
            jwt,
            mailer,
            connections,
            notifications,
            posts,
            started_at: Instant::now(),
        })
    }
}

/// Accept connections until the listener fails
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Linkup listening on {} (API under '{}', store: {})",
        state.args.listen,
        state.args.api_prefix(),
        state.store.kind()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - session cookies are not marked Secure");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let request_id = Uuid::new_v4();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    info!(%request_id, %addr, %method, %path, "Request");

    let mut response = route(Arc::clone(&state), req, &method, &path).await;
    apply_cors(&mut response, &state.args.frontend_url);
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }

    info!(
        %request_id,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Response"
    );
    Ok(response)
}

async fn route(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: &Method,
    path: &str,
) -> Response<BoxBody> {
    if method == Method::OPTIONS {
        return preflight_response();
    }

    let Some(api_path) = api_path(state.args.api_prefix(), path) else {
        return match (method, path) {
            (&Method::GET, "/health") => routes::health_check(state),
            (&Method::GET, "/version") => routes::version_info(),
            _ => routes::not_found_response(path),
        };
    };

    let handled = match first_segment(api_path) {
        "auth" => routes::handle_auth_request(req, state, api_path).await,
        "connections" => routes::handle_connections_request(req, state, api_path).await,
        "notifications" => routes::handle_notifications_request(req, state, api_path).await,
        "posts" => routes::handle_posts_request(req, state, api_path).await,
        "users" => routes::handle_users_request(req, state, api_path).await,
        "health" if method == Method::GET => Some(routes::health_check(state)),
        "version" if method == Method::GET => Some(routes::version_info()),
        _ => None,
    };

    handled.unwrap_or_else(|| routes::not_found_response(path))
}

/// The part of `path` below `prefix`, if `path` is under it
fn api_path<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn first_segment(path: &str) -> &str {
    path.trim_start_matches('/').split('/').next().unwrap_or("")
}

/// Allow the web client's origin, with credentials so the session cookie travels
fn apply_cors(response: &mut Response<BoxBody>, origin: &str) {
    let headers = response.headers_mut();
    match HeaderValue::from_str(origin.trim_end_matches('/')) {
        Ok(value) => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.insert(VARY, HeaderValue::from_static("Origin"));
        }
        Err(e) => warn!(origin = %origin, error = %e, "FRONTEND_URL is not a valid header value"),
    }
}

fn preflight_response() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_path() {
        assert_eq!(api_path("/api/v1", "/api/v1/connections"), Some("/connections"));
        assert_eq!(api_path("/api/v1", "/api/v1"), None);
        assert_eq!(api_path("/api/v1", "/api/v10/connections"), None);
        assert_eq!(api_path("/api/v1", "/health"), None);
        assert_eq!(api_path("", "/connections/requests"), Some("/connections/requests"));
    }

    #[test]
    fn test_first_segment() {
        assert_eq!(first_segment("/connections/status/abc"), "connections");
        assert_eq!(first_segment("/auth/me"), "auth");
        assert_eq!(first_segment("/"), "");
    }

    #[test]
    fn test_cors_headers() {
        let mut response = preflight_response();
        apply_cors(&mut response, "http://localhost:5173/");

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(
            headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
        assert!(headers
            .get(ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("DELETE"));
    }
}
