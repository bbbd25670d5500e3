//! HTTP routes for account sessions
//!
//! - POST /auth/signup  - create an account and start a session
//! - POST /auth/signin  - start a session
//! - GET  /auth/signout - end the session (clears the cookie)
//! - GET  /auth/me      - the caller's own profile, same as GET /users/me
//!
//! Sessions are carried in the `access_token` cookie; the token is also
//! returned in the body for clients that prefer a bearer header.

use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::info;

use crate::auth::{
    clear_session_cookie, hash_password, session_cookie, verify_password, MIN_PASSWORD_LEN,
};
use crate::db::schemas::{PublicProfile, UserDoc};
use crate::routes::common::{
    error_response, json_response, parse_json_body, with_cookie, BoxBody, MessageResponse,
};
use crate::routes::users;
use crate::server::AppState;
use crate::services::mailer::{self, WelcomeEmail};
use crate::types::{LinkupError, Result};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub token: String,
    pub user: PublicProfile,
}

// =============================================================================
// Route Handlers
// =============================================================================

pub async fn handle_auth_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    path: &str,
) -> Option<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    if !path.starts_with("/auth/") {
        return None;
    }

    let method = req.method().clone();
    let result = match (&method, path) {
        (&Method::POST, "/auth/signup") => signup(req, &state).await,
        (&Method::POST, "/auth/signin") => signin(req, &state).await,
        (&Method::GET, "/auth/signout") => Ok(signout()),
        (&Method::GET, "/auth/me") => users::me(req.headers(), &state).await,
        _ => return None,
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

/// POST /auth/signup
async fn signup<B>(req: Request<B>, state: &AppState) -> Result<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let body: SignupRequest = parse_json_body(req).await?;

    let name = body.name.trim();
    let username = body.username.trim();
    let email = body.email.trim().to_lowercase();

    if name.is_empty() || username.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(LinkupError::BadRequest("All fields are required".into()));
    }
    if !email.contains('@') {
        return Err(LinkupError::BadRequest("Invalid email address".into()));
    }
    if body.password.len() < MIN_PASSWORD_LEN {
        return Err(LinkupError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = hash_password(&body.password)?;
    let mut user = UserDoc::new(
        name.to_string(),
        username.to_string(),
        email.clone(),
        password_hash,
    );
    let id = state.store.insert_user(user.clone()).await?;
    user._id = Some(id);

    info!(user = %id, username = %user.username, "User signed up");

    mailer::spawn_welcome(
        state.mailer.clone(),
        WelcomeEmail {
            to: email,
            name: user.name.clone(),
            profile_url: mailer::profile_url(&state.args.frontend_url, &user.username),
        },
    );

    start_session(state, &user, StatusCode::CREATED, "User registered successfully")
}

/// POST /auth/signin
async fn signin<B>(req: Request<B>, state: &AppState) -> Result<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let body: SigninRequest = parse_json_body(req).await?;

    let invalid = || LinkupError::Unauthorized("Invalid username or password".into());

    let user = state
        .store
        .find_user_by_username(body.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(invalid());
    }

    info!(username = %user.username, "User signed in");
    start_session(state, &user, StatusCode::OK, "Logged in successfully")
}

/// GET /auth/signout
fn signout() -> Response<BoxBody> {
    with_cookie(
        json_response(
            StatusCode::OK,
            &MessageResponse::success("Logged out successfully"),
        ),
        &clear_session_cookie(),
    )
}

fn start_session(
    state: &AppState,
    user: &UserDoc,
    status: StatusCode,
    message: &'static str,
) -> Result<Response<BoxBody>> {
    let id = user
        ._id
        .ok_or_else(|| LinkupError::Internal("User document without _id".into()))?;
    let token = state.jwt.generate_token(&id.to_hex(), &user.username)?;
    let cookie = session_cookie(&token, state.jwt.expiry_seconds(), !state.args.dev_mode);

    let response = json_response(
        status,
        &SessionResponse {
            status: "success",
            message,
            token,
            user: user.public_profile(),
        },
    );
    Ok(with_cookie(response, &cookie))
}
