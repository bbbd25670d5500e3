//! MongoDB-backed [`SocialStore`]

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime};
use tracing::{info, warn};

use crate::db::schemas::{
    pair_key, CommentDoc, ConnectionRequestDoc, NotificationDoc, PostDoc, ProfileUpdate,
    RequestStatus, UserDoc, CONNECTION_REQUEST_COLLECTION, NOTIFICATION_COLLECTION,
    POST_COLLECTION, USER_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::store::SocialStore;
use crate::types::{LinkupError, Result};

pub struct MongoSocialStore {
    users: MongoCollection<UserDoc>,
    requests: MongoCollection<ConnectionRequestDoc>,
    notifications: MongoCollection<NotificationDoc>,
    posts: MongoCollection<PostDoc>,
}

impl MongoSocialStore {
    /// Open the collections, applying their indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let users = mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        let requests = mongo
            .collection::<ConnectionRequestDoc>(CONNECTION_REQUEST_COLLECTION)
            .await?;
        let notifications = mongo
            .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
            .await?;
        let posts = mongo.collection::<PostDoc>(POST_COLLECTION).await?;

        info!("Social store ready on database '{}'", mongo.db_name());

        Ok(Self {
            users,
            requests,
            notifications,
            posts,
        })
    }
}

#[async_trait]
impl SocialStore for MongoSocialStore {
    fn kind(&self) -> &'static str {
        "mongodb"
    }

    async fn insert_user(&self, mut user: UserDoc) -> Result<ObjectId> {
        user.email = user.email.to_lowercase();
        self.users.insert_one(user).await.map_err(|e| match e {
            LinkupError::Conflict(_) => {
                LinkupError::Conflict("Username or email already registered".into())
            }
            other => other,
        })
    }

    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "_id": *id }).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDoc>> {
        self.users.find_one(doc! { "username": username }).await
    }

    async fn find_users(&self, ids: &[ObjectId]) -> Result<Vec<UserDoc>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.users.find_many(doc! { "_id": { "$in": ids.to_vec() } }).await
    }

    async fn suggest_users(&self, exclude: &[ObjectId], limit: usize) -> Result<Vec<UserDoc>> {
        self.users
            .find_sorted(
                doc! { "_id": { "$nin": exclude.to_vec() } },
                doc! { "_id": 1 },
                Some(limit as i64),
            )
            .await
    }

    async fn update_profile(
        &self,
        id: &ObjectId,
        update: &ProfileUpdate,
    ) -> Result<Option<UserDoc>> {
        let mut set = update.to_set_document();
        set.insert("metadata.updated_at", DateTime::now());

        let result = self
            .users
            .update_one(doc! { "_id": *id }, doc! { "$set": set })
            .await
            .map_err(|e| match e {
                LinkupError::Conflict(_) => LinkupError::Conflict("Username already taken".into()),
                other => other,
            })?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        self.find_user(id).await
    }

    async fn add_connection(&self, user: &ObjectId, peer: &ObjectId) -> Result<()> {
        self.users
            .update_one(
                doc! { "_id": *user },
                doc! {
                    "$addToSet": { "connections": *peer },
                    "$set": { "metadata.updated_at": DateTime::now() }
                },
            )
            .await?;
        Ok(())
    }

    async fn remove_connection(&self, user: &ObjectId, peer: &ObjectId) -> Result<()> {
        self.users
            .update_one(
                doc! { "_id": *user },
                doc! {
                    "$pull": { "connections": *peer },
                    "$set": { "metadata.updated_at": DateTime::now() }
                },
            )
            .await?;
        Ok(())
    }

    async fn insert_request(&self, request: ConnectionRequestDoc) -> Result<ObjectId> {
        let pair = request.pair_key.clone();
        self.requests.insert_one(request).await.map_err(|e| match e {
            LinkupError::Conflict(_) => {
                warn!(pair = %pair, "Pending request insert hit unique index");
                LinkupError::DuplicateRequest
            }
            other => other,
        })
    }

    async fn find_request(&self, id: &ObjectId) -> Result<Option<ConnectionRequestDoc>> {
        self.requests.find_one(doc! { "_id": *id }).await
    }

    async fn find_pending_between(
        &self,
        a: &ObjectId,
        b: &ObjectId,
    ) -> Result<Option<ConnectionRequestDoc>> {
        self.requests
            .find_one(doc! {
                "pair_key": pair_key(a, b),
                "status": RequestStatus::Pending.as_str(),
            })
            .await
    }

    async fn list_pending_for(&self, recipient: &ObjectId) -> Result<Vec<ConnectionRequestDoc>> {
        self.requests
            .find_many(doc! {
                "recipient": *recipient,
                "status": RequestStatus::Pending.as_str(),
            })
            .await
    }

    async fn transition_request(&self, id: &ObjectId, to: RequestStatus) -> Result<bool> {
        // Conditional on still being pending, so a replayed accept/reject is a no-op
        let result = self
            .requests
            .update_one(
                doc! { "_id": *id, "status": RequestStatus::Pending.as_str() },
                doc! {
                    "$set": {
                        "status": to.as_str(),
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn insert_notification(&self, notification: NotificationDoc) -> Result<ObjectId> {
        self.notifications.insert_one(notification).await
    }

    async fn list_notifications(&self, recipient: &ObjectId) -> Result<Vec<NotificationDoc>> {
        self.notifications
            .find_sorted(
                doc! { "recipient": *recipient },
                doc! { "metadata.created_at": -1, "_id": -1 },
                None,
            )
            .await
    }

    async fn mark_notification_read(
        &self,
        id: &ObjectId,
        recipient: &ObjectId,
    ) -> Result<Option<NotificationDoc>> {
        let filter = doc! { "_id": *id, "recipient": *recipient };
        let result = self
            .notifications
            .update_one(
                filter.clone(),
                doc! { "$set": { "read": true, "metadata.updated_at": DateTime::now() } },
            )
            .await?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        self.notifications.find_one(filter).await
    }

    async fn delete_notification(&self, id: &ObjectId, recipient: &ObjectId) -> Result<()> {
        self.notifications
            .soft_delete(doc! { "_id": *id, "recipient": *recipient })
            .await?;
        Ok(())
    }

    async fn insert_post(&self, post: PostDoc) -> Result<ObjectId> {
        self.posts.insert_one(post).await
    }

    async fn find_post(&self, id: &ObjectId) -> Result<Option<PostDoc>> {
        self.posts.find_one(doc! { "_id": *id }).await
    }

    async fn list_posts_by_authors(&self, authors: &[ObjectId]) -> Result<Vec<PostDoc>> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        self.posts
            .find_sorted(
                doc! { "author": { "$in": authors.to_vec() } },
                doc! { "metadata.created_at": -1, "_id": -1 },
                None,
            )
            .await
    }

    async fn delete_post(&self, id: &ObjectId) -> Result<()> {
        self.posts.soft_delete(doc! { "_id": *id }).await?;
        Ok(())
    }

    async fn add_comment(&self, post: &ObjectId, comment: CommentDoc) -> Result<Option<PostDoc>> {
        let comment = bson::to_bson(&comment)
            .map_err(|e| LinkupError::Internal(format!("Failed to encode comment: {}", e)))?;

        let result = self
            .posts
            .update_one(
                doc! { "_id": *post },
                doc! {
                    "$push": { "comments": comment },
                    "$set": { "metadata.updated_at": DateTime::now() }
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        self.find_post(post).await
    }

    async fn toggle_like(
        &self,
        post: &ObjectId,
        user: &ObjectId,
    ) -> Result<Option<(PostDoc, bool)>> {
        // Add only if absent; when nothing changed the like was already there
        let added = self
            .posts
            .update_one(
                doc! { "_id": *post, "likes": { "$ne": *user } },
                doc! {
                    "$addToSet": { "likes": *user },
                    "$set": { "metadata.updated_at": DateTime::now() }
                },
            )
            .await?;

        let liked = added.modified_count == 1;
        if !liked {
            self.posts
                .update_one(
                    doc! { "_id": *post, "likes": *user },
                    doc! {
                        "$pull": { "likes": *user },
                        "$set": { "metadata.updated_at": DateTime::now() }
                    },
                )
                .await?;
        }

        Ok(self.find_post(post).await?.map(|p| (p, liked)))
    }
}
