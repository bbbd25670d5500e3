//! Linkup - professional network API
//!
//! Users connect with each other through connection requests. A request is
//! sent, then accepted or rejected by its recipient; acceptance adds a
//! symmetric edge to both users' `connections`, drops a notification in the
//! sender's inbox and emails the sender in the background. Around that sit
//! editable profiles and a home feed of posts from the caller's network.
//!
//! ## Layout
//!
//! - **store**: `SocialStore` contract with MongoDB and in-memory backends
//! - **services**: connection workflow, notification inbox, post feed, mailer
//! - **auth**: JWT sessions and Argon2 password hashing
//! - **routes** / **server**: the hyper HTTP surface

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{LinkupError, Result};
