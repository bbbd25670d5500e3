//! HTTP routes for connection requests and the caller's connections
//!
//! - POST   /connections/request/:userId
//! - PUT    /connections/accept/:requestId
//! - PUT    /connections/reject/:requestId
//! - GET    /connections/requests
//! - GET    /connections
//! - DELETE /connections/:userId
//! - GET    /connections/status/:userId

use hyper::header::HeaderMap;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::db::schemas::PublicProfile;
use crate::routes::common::{
    current_user, error_response, json_response, parse_id, BoxBody, MessageResponse,
};
use crate::server::AppState;
use crate::services::IncomingRequest;
use crate::types::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestSentResponse {
    status: &'static str,
    message: &'static str,
    request_id: String,
}

#[derive(Debug, Serialize)]
struct RequestsResponse {
    status: &'static str,
    requests: Vec<IncomingRequest>,
}

#[derive(Debug, Serialize)]
struct ConnectionsResponse {
    status: &'static str,
    connections: Vec<PublicProfile>,
}

/// Route `/connections/*`; `path` is relative to the API prefix
pub async fn handle_connections_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    path: &str,
) -> Option<Response<BoxBody>> {
    let rest = path.strip_prefix("/connections")?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let headers = req.headers();

    let result = match (req.method(), segments.as_slice()) {
        (&Method::POST, ["request", user_id]) => send_request(headers, &state, user_id).await,
        (&Method::PUT, ["accept", request_id]) => accept_request(headers, &state, request_id).await,
        (&Method::PUT, ["reject", request_id]) => reject_request(headers, &state, request_id).await,
        (&Method::GET, ["requests"]) => list_requests(headers, &state).await,
        (&Method::GET, ["status", user_id]) => connection_status(headers, &state, user_id).await,
        (&Method::GET, []) => list_connections(headers, &state).await,
        (&Method::DELETE, [user_id]) => remove_connection(headers, &state, user_id).await,
        _ => return None,
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

/// POST /connections/request/:userId
async fn send_request(
    headers: &HeaderMap,
    state: &AppState,
    user_id: &str,
) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let target = parse_id(user_id)?;

    let request = state.connections.send_request(&user, &target).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &RequestSentResponse {
            status: "success",
            message: "Connection request sent successfully",
            request_id: request._id.map(|id| id.to_hex()).unwrap_or_default(),
        },
    ))
}

/// PUT /connections/accept/:requestId
async fn accept_request(
    headers: &HeaderMap,
    state: &AppState,
    request_id: &str,
) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let request_id = parse_id(request_id)?;

    // The email task is left running; the response does not wait for it
    state.connections.accept_request(&user, &request_id).await?;

    Ok(json_response(
        StatusCode::OK,
        &MessageResponse::success("Connection accepted successfully"),
    ))
}

/// PUT /connections/reject/:requestId
async fn reject_request(
    headers: &HeaderMap,
    state: &AppState,
    request_id: &str,
) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let request_id = parse_id(request_id)?;

    state.connections.reject_request(&user, &request_id).await?;

    Ok(json_response(
        StatusCode::OK,
        &MessageResponse::success("Connection request rejected"),
    ))
}

/// GET /connections/requests
async fn list_requests(headers: &HeaderMap, state: &AppState) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let requests = state.connections.list_incoming(&user).await?;

    Ok(json_response(
        StatusCode::OK,
        &RequestsResponse {
            status: "success",
            requests,
        },
    ))
}

/// GET /connections
async fn list_connections(headers: &HeaderMap, state: &AppState) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let connections = state.connections.list_connections(&user).await?;

    Ok(json_response(
        StatusCode::OK,
        &ConnectionsResponse {
            status: "success",
            connections,
        },
    ))
}

/// DELETE /connections/:userId
async fn remove_connection(
    headers: &HeaderMap,
    state: &AppState,
    user_id: &str,
) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let other = parse_id(user_id)?;

    state.connections.remove_connection(&user, &other).await?;

    Ok(json_response(
        StatusCode::OK,
        &MessageResponse::success("Connection removed successfully"),
    ))
}

/// GET /connections/status/:userId
///
/// The body is the status itself, e.g. `{"status":"received","requestId":"..."}`.
async fn connection_status(
    headers: &HeaderMap,
    state: &AppState,
    user_id: &str,
) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let target = parse_id(user_id)?;

    let status = state.connections.connection_status(&user, &target).await?;
    Ok(json_response(StatusCode::OK, &status))
}
