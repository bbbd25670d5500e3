//! Session resolution: request credentials -> [`CurrentUser`]
//!
//! The resolved user is handed explicitly to every service call.

use bson::oid::ObjectId;
use std::collections::HashSet;

use crate::auth::jwt::{extract_cookie, extract_token_from_header, JwtValidator};
use crate::db::schemas::UserDoc;
use crate::store::SocialStore;
use crate::types::{LinkupError, Result};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "access_token";

/// The authenticated caller, as loaded at the start of the request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: ObjectId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub connections: HashSet<ObjectId>,
}

impl CurrentUser {
    pub fn is_connected_to(&self, other: &ObjectId) -> bool {
        self.connections.contains(other)
    }
}

impl TryFrom<UserDoc> for CurrentUser {
    type Error = LinkupError;

    fn try_from(user: UserDoc) -> Result<Self> {
        let id = user
            ._id
            .ok_or_else(|| LinkupError::Internal("User document without _id".into()))?;
        Ok(Self {
            id,
            name: user.name,
            username: user.username,
            email: user.email,
            connections: user.connections.into_iter().collect(),
        })
    }
}

/// Resolve the caller from the Cookie and Authorization headers.
///
/// The cookie wins when both are present.
pub async fn authenticate(
    store: &dyn SocialStore,
    jwt: &JwtValidator,
    cookie_header: Option<&str>,
    auth_header: Option<&str>,
) -> Result<CurrentUser> {
    let token = extract_cookie(cookie_header, SESSION_COOKIE)
        .or_else(|| extract_token_from_header(auth_header))
        .ok_or_else(|| LinkupError::Unauthorized("You are not logged in".into()))?;

    let result = jwt.verify_token(token);
    let claims = match result.claims {
        Some(claims) if result.valid => claims,
        _ => {
            return Err(LinkupError::Unauthorized(
                result.error.unwrap_or_else(|| "Invalid token".into()),
            ))
        }
    };

    let user_id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| LinkupError::Unauthorized("Invalid token subject".into()))?;

    let user = store
        .find_user(&user_id)
        .await?
        .ok_or_else(|| LinkupError::NotFound("User not found".into()))?;

    CurrentUser::try_from(user)
}

/// `Set-Cookie` value for a fresh session
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that clears the session
pub fn clear_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        SESSION_COOKIE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySocialStore;

    fn jwt() -> JwtValidator {
        JwtValidator::new("session-test-secret-at-least-32-characters".into(), 60).unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_from_cookie_and_header() {
        let store = MemorySocialStore::new();
        let id = store
            .insert_user(UserDoc::new(
                "Ada".into(),
                "ada".into(),
                "ada@example.com".into(),
                "hash".into(),
            ))
            .await
            .unwrap();
        let token = jwt().generate_token(&id.to_hex(), "ada").unwrap();

        let cookie = format!("access_token={}", token);
        let user = authenticate(&store, &jwt(), Some(&cookie), None)
            .await
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "ada");

        let bearer = format!("Bearer {}", token);
        let user = authenticate(&store, &jwt(), None, Some(&bearer))
            .await
            .unwrap();
        assert_eq!(user.id, id);
    }

    #[tokio::test]
    async fn test_authenticate_failures() {
        let store = MemorySocialStore::new();

        let missing = authenticate(&store, &jwt(), None, None).await;
        assert!(matches!(missing, Err(LinkupError::Unauthorized(_))));

        let garbage = authenticate(&store, &jwt(), Some("access_token=nope"), None).await;
        assert!(matches!(garbage, Err(LinkupError::Unauthorized(_))));

        // Valid token for a user that does not exist
        let token = jwt().generate_token(&ObjectId::new().to_hex(), "ghost").unwrap();
        let cookie = format!("access_token={}", token);
        let ghost = authenticate(&store, &jwt(), Some(&cookie), None).await;
        assert!(matches!(ghost, Err(LinkupError::NotFound(_))));
    }

    #[test]
    fn test_cookie_flags() {
        let cookie = session_cookie("abc", 60, true);
        assert!(cookie.starts_with("access_token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.ends_with("; Secure"));
        assert!(!session_cookie("abc", 60, false).contains("Secure"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
