//! HTTP routes for the post feed
//!
//! - GET    /posts              - feed of the caller and their connections
//! - POST   /posts/create       - new post
//! - DELETE /posts/delete/:id   - delete one of the caller's posts
//! - GET    /posts/:id          - one post
//! - POST   /posts/:id/comment  - comment on a post
//! - POST   /posts/:id/like     - like or unlike a post

use hyper::body::Body;
use hyper::header::HeaderMap;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::sync::Arc;

use crate::routes::common::{
    current_user, error_response, json_response, parse_id, read_json, BoxBody, MessageResponse,
};
use crate::server::AppState;
use crate::services::PostView;
use crate::types::Result;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct FeedResponse {
    status: &'static str,
    posts: Vec<PostView>,
}

#[derive(Debug, Serialize)]
struct PostResponse {
    status: &'static str,
    post: PostView,
}

pub async fn handle_posts_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    path: &str,
) -> Option<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let rest = path.strip_prefix("/posts")?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let (parts, body) = req.into_parts();
    let headers = &parts.headers;

    let result = match (&parts.method, segments.as_slice()) {
        (&Method::GET, []) => feed(headers, &state).await,
        (&Method::POST, ["create"]) => create_post(headers, &state, body).await,
        (&Method::DELETE, ["delete", id]) => delete_post(headers, &state, id).await,
        (&Method::GET, [id]) => get_post(headers, &state, id).await,
        (&Method::POST, [id, "comment"]) => comment(headers, &state, id, body).await,
        (&Method::POST, [id, "like"]) => like(headers, &state, id).await,
        _ => return None,
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

/// GET /posts
async fn feed(headers: &HeaderMap, state: &AppState) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let posts = state.posts.feed(&user).await?;

    Ok(json_response(
        StatusCode::OK,
        &FeedResponse {
            status: "success",
            posts,
        },
    ))
}

/// POST /posts/create
async fn create_post<B>(headers: &HeaderMap, state: &AppState, body: B) -> Result<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let user = current_user(headers, state).await?;
    let body: CreatePostRequest = read_json(body).await?;

    let post = state
        .posts
        .create(&user, &body.content, body.image.as_deref())
        .await?;

    Ok(json_response(
        StatusCode::CREATED,
        &PostResponse {
            status: "success",
            post,
        },
    ))
}

/// DELETE /posts/delete/:id
async fn delete_post(headers: &HeaderMap, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let id = parse_id(id)?;

    state.posts.delete(&user, &id).await?;

    Ok(json_response(
        StatusCode::OK,
        &MessageResponse::success("Post deleted successfully"),
    ))
}

/// GET /posts/:id
async fn get_post(headers: &HeaderMap, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    current_user(headers, state).await?;
    let id = parse_id(id)?;

    let post = state.posts.get(&id).await?;

    Ok(json_response(
        StatusCode::OK,
        &PostResponse {
            status: "success",
            post,
        },
    ))
}

/// POST /posts/:id/comment
async fn comment<B>(
    headers: &HeaderMap,
    state: &AppState,
    id: &str,
    body: B,
) -> Result<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let user = current_user(headers, state).await?;
    let id = parse_id(id)?;
    let body: CommentRequest = read_json(body).await?;

    let post = state.posts.comment(&user, &id, &body.content).await?;

    Ok(json_response(
        StatusCode::OK,
        &PostResponse {
            status: "success",
            post,
        },
    ))
}

/// POST /posts/:id/like
///
/// The body is the updated post itself, as the web client expects.
async fn like(headers: &HeaderMap, state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let id = parse_id(id)?;

    let post = state.posts.toggle_like(&user, &id).await?;
    Ok(json_response(StatusCode::OK, &post))
}
