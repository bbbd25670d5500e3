//! HTTP routes for the notification inbox
//!
//! - GET    /notifications
//! - PUT    /notifications/:id/read
//! - DELETE /notifications/:id

use hyper::header::HeaderMap;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::common::{
    current_user, error_response, json_response, parse_id, BoxBody, MessageResponse,
};
use crate::server::AppState;
use crate::services::NotificationView;
use crate::types::Result;

#[derive(Debug, Serialize)]
struct NotificationsResponse {
    status: &'static str,
    notifications: Vec<NotificationView>,
}

#[derive(Debug, Serialize)]
struct NotificationResponse {
    status: &'static str,
    notification: NotificationView,
}

pub async fn handle_notifications_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    path: &str,
) -> Option<Response<BoxBody>> {
    let rest = path.strip_prefix("/notifications")?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let headers = req.headers();

    let result = match (req.method(), segments.as_slice()) {
        (&Method::GET, []) => list(headers, &state).await,
        (&Method::PUT, [id, "read"]) => mark_read(headers, &state, id).await,
        (&Method::DELETE, [id]) => delete(headers, &state, id).await,
        _ => return None,
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

/// GET /notifications
async fn list(headers: &HeaderMap, state: &AppState) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let notifications = state.notifications.list(&user).await?;

    Ok(json_response(
        StatusCode::OK,
        &NotificationsResponse {
            status: "success",
            notifications,
        },
    ))
}

/// PUT /notifications/:id/read
async fn mark_read(headers: &HeaderMap, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let id = parse_id(id)?;

    let notification = state.notifications.mark_read(&user, &id).await?;

    Ok(json_response(
        StatusCode::OK,
        &NotificationResponse {
            status: "success",
            notification,
        },
    ))
}

/// DELETE /notifications/:id
async fn delete(headers: &HeaderMap, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let id = parse_id(id)?;

    state.notifications.delete(&user, &id).await?;

    Ok(json_response(
        StatusCode::OK,
        &MessageResponse::success("Notification deleted"),
    ))
}
