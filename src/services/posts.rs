//! Post feed: create, read, delete, comment and like
//!
//! The feed is the caller's own posts plus those of their connections, as
//! of the session's `connections` set. Commenting on or liking someone
//! else's post leaves a notification in the author's inbox.

use bson::oid::ObjectId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::CurrentUser;
use crate::db::schemas::{CommentDoc, NotificationDoc, NotificationType, PostDoc, PublicProfile};
use crate::store::SocialStore;
use crate::types::{LinkupError, Result};

/// A post with its author and commenters expanded
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub author: Option<PublicProfile>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub likes: Vec<String>,
    pub comments: Vec<CommentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub user: Option<PublicProfile>,
    pub content: String,
    pub created_at: String,
}

pub struct PostService {
    store: Arc<dyn SocialStore>,
}

impl PostService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    /// Posts by the caller and their connections, newest first
    pub async fn feed(&self, user: &CurrentUser) -> Result<Vec<PostView>> {
        let mut authors: Vec<ObjectId> = user.connections.iter().copied().collect();
        authors.push(user.id);

        let posts = self.store.list_posts_by_authors(&authors).await?;
        self.expand(posts).await
    }

    pub async fn create(
        &self,
        user: &CurrentUser,
        content: &str,
        image: Option<&str>,
    ) -> Result<PostView> {
        let content = content.trim();
        let image = image.map(str::trim).filter(|url| !url.is_empty());
        if content.is_empty() && image.is_none() {
            return Err(LinkupError::BadRequest("Post content is required".into()));
        }

        let mut post = PostDoc::new(user.id, content.to_string(), image.map(str::to_string));
        let id = self.store.insert_post(post.clone()).await?;
        post._id = Some(id);

        info!(post = %id, author = %user.id, "Post created");
        self.expand_one(post).await
    }

    pub async fn get(&self, post_id: &ObjectId) -> Result<PostView> {
        let post = self.load(post_id).await?;
        self.expand_one(post).await
    }

    /// Delete one of the caller's own posts
    pub async fn delete(&self, user: &CurrentUser, post_id: &ObjectId) -> Result<()> {
        let post = self.load(post_id).await?;
        if post.author != user.id {
            return Err(LinkupError::Forbidden(
                "You are not authorized to delete this post".into(),
            ));
        }

        self.store.delete_post(post_id).await?;
        info!(post = %post_id, author = %user.id, "Post deleted");
        Ok(())
    }

    /// Comment on a post; the author is notified unless they wrote the comment
    pub async fn comment(
        &self,
        user: &CurrentUser,
        post_id: &ObjectId,
        content: &str,
    ) -> Result<PostView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(LinkupError::BadRequest("Comment content is required".into()));
        }

        let post = self
            .store
            .add_comment(post_id, CommentDoc::new(user.id, content.to_string()))
            .await?
            .ok_or_else(not_found)?;

        if post.author != user.id {
            self.store
                .insert_notification(NotificationDoc::post_activity(
                    post.author,
                    NotificationType::Comment,
                    user.id,
                    *post_id,
                ))
                .await?;
        }

        debug!(post = %post_id, user = %user.id, "Comment added");
        self.expand_one(post).await
    }

    /// Like or unlike a post. Only a new like on someone else's post notifies.
    pub async fn toggle_like(&self, user: &CurrentUser, post_id: &ObjectId) -> Result<PostView> {
        let (post, liked) = self
            .store
            .toggle_like(post_id, &user.id)
            .await?
            .ok_or_else(not_found)?;

        if liked && post.author != user.id {
            self.store
                .insert_notification(NotificationDoc::post_activity(
                    post.author,
                    NotificationType::Like,
                    user.id,
                    *post_id,
                ))
                .await?;
        }

        debug!(post = %post_id, user = %user.id, liked, "Like toggled");
        self.expand_one(post).await
    }

    async fn load(&self, post_id: &ObjectId) -> Result<PostDoc> {
        self.store.find_post(post_id).await?.ok_or_else(not_found)
    }

    async fn expand_one(&self, post: PostDoc) -> Result<PostView> {
        let mut views = self.expand(vec![post]).await?;
        views
            .pop()
            .ok_or_else(|| LinkupError::Internal("Post vanished during expansion".into()))
    }

    /// Resolve authors and commenters with one user lookup
    async fn expand(&self, posts: Vec<PostDoc>) -> Result<Vec<PostView>> {
        let mut ids: Vec<ObjectId> = posts
            .iter()
            .flat_map(|p| std::iter::once(p.author).chain(p.comments.iter().map(|c| c.user)))
            .collect();
        ids.sort();
        ids.dedup();

        let profiles: HashMap<ObjectId, PublicProfile> = self
            .store
            .find_users(&ids)
            .await?
            .into_iter()
            .filter_map(|u| Some((u._id?, u.public_profile())))
            .collect();

        Ok(posts
            .into_iter()
            .map(|post| PostView {
                id: post._id.map(|id| id.to_hex()).unwrap_or_default(),
                author: profiles.get(&post.author).cloned(),
                content: post.content,
                image: post.image,
                likes: post.likes.iter().map(|id| id.to_hex()).collect(),
                comments: post
                    .comments
                    .into_iter()
                    .map(|c| CommentView {
                        id: c._id.to_hex(),
                        user: profiles.get(&c.user).cloned(),
                        content: c.content,
                        created_at: c.created_at.to_chrono().to_rfc3339(),
                    })
                    .collect(),
                created_at: post.metadata.created_at.map(|t| t.to_chrono().to_rfc3339()),
            })
            .collect())
    }
}

fn not_found() -> LinkupError {
    LinkupError::NotFound("Post not found".into())
}
