//! HTTP routes for Linkup
//!
//! Each `handle_*_request` takes the path relative to the API prefix and
//! returns `None` when the path is not one of its routes.

pub mod auth_routes;
pub mod common;
pub mod connections;
pub mod health;
pub mod notifications;
pub mod posts;
pub mod users;

pub use auth_routes::handle_auth_request;
pub use common::{error_response, json_response, not_found_response, BoxBody};
pub use connections::handle_connections_request;
pub use health::{health_check, version_info};
pub use notifications::handle_notifications_request;
pub use posts::handle_posts_request;
pub use users::handle_users_request;
