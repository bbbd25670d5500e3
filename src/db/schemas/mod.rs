//! Database schemas for Linkup
//!
//! Defines MongoDB document structures for users, connection requests,
//! notifications and posts.

mod connection_request;
mod metadata;
mod notification;
mod post;
mod user;

pub use connection_request::{
    pair_key, ConnectionRequestDoc, RequestStatus, CONNECTION_REQUEST_COLLECTION,
};
pub use metadata::Metadata;
pub use notification::{NotificationDoc, NotificationType, NOTIFICATION_COLLECTION};
pub use post::{CommentDoc, PostDoc, POST_COLLECTION};
pub use user::{ProfileUpdate, PublicProfile, UserDoc, USER_COLLECTION};
