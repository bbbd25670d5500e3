//! Persistence contract for the social graph
//!
//! Four record kinds live behind [`SocialStore`]: users (with their
//! `connections` set), connection requests, notifications and posts. Every
//! method is a single-document operation; nothing here spans documents
//! atomically.
//!
//! - [`MongoSocialStore`] - production, one MongoDB collection per kind
//! - [`MemorySocialStore`] - in-process maps for dev mode and tests

use async_trait::async_trait;
use bson::oid::ObjectId;

use crate::db::schemas::{
    CommentDoc, ConnectionRequestDoc, NotificationDoc, PostDoc, ProfileUpdate, RequestStatus,
    UserDoc,
};
use crate::types::Result;

pub mod memory;
pub mod mongo;

pub use memory::MemorySocialStore;
pub use mongo::MongoSocialStore;

#[async_trait]
pub trait SocialStore: Send + Sync {
    /// Short name for health output and logs
    fn kind(&self) -> &'static str;

    // --- users ---

    /// Insert a user. Username and email are unique (`Conflict` otherwise).
    async fn insert_user(&self, user: UserDoc) -> Result<ObjectId>;

    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDoc>>;

    /// Users whose id is in `ids`, in store order; unknown ids are skipped
    async fn find_users(&self, ids: &[ObjectId]) -> Result<Vec<UserDoc>>;

    /// Up to `limit` users whose id is not in `exclude`
    async fn suggest_users(&self, exclude: &[ObjectId], limit: usize) -> Result<Vec<UserDoc>>;

    /// Apply a profile update and return the updated user, `None` if missing.
    /// A username taken by someone else fails with `Conflict`.
    async fn update_profile(
        &self,
        id: &ObjectId,
        update: &ProfileUpdate,
    ) -> Result<Option<UserDoc>>;

    /// Set-add `peer` to `user.connections`. Idempotent.
    async fn add_connection(&self, user: &ObjectId, peer: &ObjectId) -> Result<()>;

    /// Set-remove `peer` from `user.connections`. Idempotent, no error if absent.
    async fn remove_connection(&self, user: &ObjectId, peer: &ObjectId) -> Result<()>;

    // --- connection requests ---

    /// Insert a request. A second pending request for the same unordered
    /// pair fails with `DuplicateRequest`.
    async fn insert_request(&self, request: ConnectionRequestDoc) -> Result<ObjectId>;

    async fn find_request(&self, id: &ObjectId) -> Result<Option<ConnectionRequestDoc>>;

    /// The pending request between `a` and `b` in either direction
    async fn find_pending_between(
        &self,
        a: &ObjectId,
        b: &ObjectId,
    ) -> Result<Option<ConnectionRequestDoc>>;

    /// Pending requests addressed to `recipient`
    async fn list_pending_for(&self, recipient: &ObjectId) -> Result<Vec<ConnectionRequestDoc>>;

    /// Move a request out of `pending`. Returns false, writing nothing, when
    /// the request is missing or no longer pending.
    async fn transition_request(&self, id: &ObjectId, to: RequestStatus) -> Result<bool>;

    // --- notifications ---

    async fn insert_notification(&self, notification: NotificationDoc) -> Result<ObjectId>;

    /// Inbox of `recipient`, newest first
    async fn list_notifications(&self, recipient: &ObjectId) -> Result<Vec<NotificationDoc>>;

    /// Mark read; `None` if the notification is missing or owned by someone else
    async fn mark_notification_read(
        &self,
        id: &ObjectId,
        recipient: &ObjectId,
    ) -> Result<Option<NotificationDoc>>;

    /// Delete if owned by `recipient`. Idempotent.
    async fn delete_notification(&self, id: &ObjectId, recipient: &ObjectId) -> Result<()>;

    // --- posts ---

    async fn insert_post(&self, post: PostDoc) -> Result<ObjectId>;

    async fn find_post(&self, id: &ObjectId) -> Result<Option<PostDoc>>;

    /// Posts written by any of `authors`, newest first
    async fn list_posts_by_authors(&self, authors: &[ObjectId]) -> Result<Vec<PostDoc>>;

    /// Delete a post. Idempotent.
    async fn delete_post(&self, id: &ObjectId) -> Result<()>;

    /// Append a comment and return the updated post, `None` if missing
    async fn add_comment(&self, post: &ObjectId, comment: CommentDoc) -> Result<Option<PostDoc>>;

    /// Like the post for `user`, or unlike it if already liked. Returns the
    /// updated post and whether `user` now likes it; `None` if missing.
    async fn toggle_like(
        &self,
        post: &ObjectId,
        user: &ObjectId,
    ) -> Result<Option<(PostDoc, bool)>>;
}
