//! Authentication for Linkup
//!
//! Provides:
//! - JWT token generation and validation
//! - Password hashing with Argon2
//! - Session resolution into a [`CurrentUser`]

pub mod jwt;
pub mod password;
pub mod session;

pub use jwt::{extract_cookie, extract_token_from_header, Claims, JwtValidator};
pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use session::{
    authenticate, clear_session_cookie, session_cookie, CurrentUser, SESSION_COOKIE,
};
