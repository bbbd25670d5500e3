//! HTTP routes for profiles and discovery
//!
//! - GET /users/me          - the caller's own profile
//! - GET /users/suggestions - people the caller might know
//! - PUT /users/profile     - edit the caller's profile text
//! - GET /users/:username   - a public profile, no session needed

use bson::oid::ObjectId;
use hyper::body::Body;
use hyper::header::HeaderMap;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{ProfileUpdate, PublicProfile, UserDoc};
use crate::routes::common::{current_user, error_response, json_response, read_json, BoxBody};
use crate::server::AppState;
use crate::types::{LinkupError, Result};

/// How many suggestions are returned at most
const SUGGESTION_LIMIT: usize = 3;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionsResponse {
    status: &'static str,
    suggested_user: Vec<PublicProfile>,
}

#[derive(Debug, Serialize)]
struct ProfileResponse {
    status: &'static str,
    user: PublicProfile,
}

/// The caller's own profile; unlike [`PublicProfile`] it includes the email
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub status: &'static str,
    pub user: OwnProfile,
}

#[derive(Debug, Serialize)]
pub struct OwnProfile {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub email: String,
}

impl From<UserDoc> for OwnProfile {
    fn from(user: UserDoc) -> Self {
        Self {
            profile: user.public_profile(),
            email: user.email,
        }
    }
}

pub async fn handle_users_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    path: &str,
) -> Option<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let rest = path.strip_prefix("/users/")?;
    let (parts, body) = req.into_parts();
    let headers = &parts.headers;

    let result = match (&parts.method, rest) {
        (&Method::GET, "me") => me(headers, &state).await,
        (&Method::GET, "suggestions") => suggestions(headers, &state).await,
        (&Method::PUT, "profile") => update_profile(headers, &state, body).await,
        (&Method::GET, username) if !username.is_empty() && !username.contains('/') => {
            profile(&state, username).await
        }
        _ => return None,
    };

    Some(result.unwrap_or_else(|e| error_response(&e)))
}

/// GET /users/me (also served at /auth/me)
pub(crate) async fn me(headers: &HeaderMap, state: &AppState) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;
    let doc = state
        .store
        .find_user(&user.id)
        .await?
        .ok_or_else(|| LinkupError::NotFound("User not found".into()))?;

    Ok(json_response(
        StatusCode::OK,
        &MeResponse {
            status: "success",
            user: doc.into(),
        },
    ))
}

/// GET /users/suggestions
async fn suggestions(headers: &HeaderMap, state: &AppState) -> Result<Response<BoxBody>> {
    let user = current_user(headers, state).await?;

    let mut exclude: Vec<ObjectId> = user.connections.iter().copied().collect();
    exclude.push(user.id);

    let users = state.store.suggest_users(&exclude, SUGGESTION_LIMIT).await?;

    Ok(json_response(
        StatusCode::OK,
        &SuggestionsResponse {
            status: "success",
            suggested_user: users.iter().map(|u| u.public_profile()).collect(),
        },
    ))
}

/// PUT /users/profile
async fn update_profile<B>(
    headers: &HeaderMap,
    state: &AppState,
    body: B,
) -> Result<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let user = current_user(headers, state).await?;
    let update = read_json::<ProfileUpdate, _>(body).await?.normalized();

    let updated = state
        .store
        .update_profile(&user.id, &update)
        .await?
        .ok_or_else(|| LinkupError::NotFound("User not found".into()))?;

    info!(user = %user.id, "Profile updated");
    Ok(json_response(
        StatusCode::OK,
        &MeResponse {
            status: "success",
            user: updated.into(),
        },
    ))
}

/// GET /users/:username
async fn profile(state: &AppState, username: &str) -> Result<Response<BoxBody>> {
    let username = urlencoding::decode(username)
        .map_err(|_| LinkupError::BadRequest("Invalid username".into()))?;
    let user = state
        .store
        .find_user_by_username(&username)
        .await?
        .ok_or_else(|| LinkupError::NotFound("User not found".into()))?;

    Ok(json_response(
        StatusCode::OK,
        &ProfileResponse {
            status: "success",
            user: user.public_profile(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::common::testing::{app, body_json, request, sign_in};
    use serde_json::json;

    #[tokio::test]
    async fn test_me_is_mounted_under_users() {
        let state = app();
        let (id, headers) = sign_in(&state, "ada").await;

        let response = handle_users_request(
            request(Method::GET, &headers, None),
            state.clone(),
            "/users/me",
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["user"]["id"], id.to_hex());
        assert_eq!(body["user"]["email"], "ada@example.com");

        let anonymous = handle_users_request(
            request(Method::GET, &HeaderMap::new(), None),
            state,
            "/users/me",
        )
        .await
        .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_suggestions_key_and_exclusions() {
        let state = app();
        let (ada, headers) = sign_in(&state, "ada").await;
        let (bob, _) = sign_in(&state, "bob").await;
        sign_in(&state, "cyd").await;
        state.store.add_connection(&ada, &bob).await.unwrap();
        state.store.add_connection(&bob, &ada).await.unwrap();

        let response = handle_users_request(
            request(Method::GET, &headers, None),
            state,
            "/users/suggestions",
        )
        .await
        .unwrap();
        let body = body_json(response).await;

        assert_eq!(body["status"], "success");
        assert!(body.get("suggestedUsers").is_none());
        let usernames: Vec<&str> = body["suggestedUser"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["username"].as_str().unwrap())
            .collect();
        assert_eq!(usernames, vec!["cyd"]);
    }

    #[tokio::test]
    async fn test_public_profile_needs_no_session() {
        let state = app();
        sign_in(&state, "ada").await;

        let response = handle_users_request(
            request(Method::GET, &HeaderMap::new(), None),
            state.clone(),
            "/users/ada",
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["username"], "ada");
        assert!(body["user"].get("email").is_none());

        let missing = handle_users_request(
            request(Method::GET, &HeaderMap::new(), None),
            state,
            "/users/nobody",
        )
        .await
        .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let state = app();
        let (_, headers) = sign_in(&state, "ada").await;
        sign_in(&state, "bob").await;

        let response = handle_users_request(
            request(
                Method::PUT,
                &headers,
                Some(json!({
                    "headline": "Analytical engine programmer",
                    "about": "First of her kind",
                    "name": "",
                    "skills": ["math", "poetry"]
                })),
            ),
            state.clone(),
            "/users/profile",
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["user"]["headline"], "Analytical engine programmer");
        assert_eq!(body["user"]["about"], "First of her kind");
        assert_eq!(body["user"]["skills"], json!(["math", "poetry"]));
        // Blank fields are left alone
        assert_eq!(body["user"]["name"], "ADA");

        let taken = handle_users_request(
            request(Method::PUT, &headers, Some(json!({ "username": "bob" }))),
            state.clone(),
            "/users/profile",
        )
        .await
        .unwrap();
        assert_eq!(taken.status(), StatusCode::CONFLICT);

        let anonymous = handle_users_request(
            request(Method::PUT, &HeaderMap::new(), Some(json!({ "about": "x" }))),
            state,
            "/users/profile",
        )
        .await
        .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }
}
