//! Post document schema
//!
//! A post in the home feed. Likes and comments are embedded; a like is a
//! set entry keyed by user id, comments are kept in the order written.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for posts
pub const POST_COLLECTION: &str = "posts";

/// A comment embedded in its post
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CommentDoc {
    pub _id: ObjectId,

    /// Author of the comment
    pub user: ObjectId,

    pub content: String,

    pub created_at: DateTime,
}

impl CommentDoc {
    pub fn new(user: ObjectId, content: String) -> Self {
        Self {
            _id: ObjectId::new(),
            user,
            content,
            created_at: DateTime::now(),
        }
    }
}

/// Post stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PostDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub author: ObjectId,

    #[serde(default)]
    pub content: String,

    /// URL of an already hosted image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Users who like the post. Set semantics.
    #[serde(default)]
    pub likes: Vec<ObjectId>,

    #[serde(default)]
    pub comments: Vec<CommentDoc>,
}

impl PostDoc {
    pub fn new(author: ObjectId, content: String, image: Option<String>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            author,
            content,
            image,
            likes: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn is_liked_by(&self, user: &ObjectId) -> bool {
        self.likes.contains(user)
    }

    /// Add `user` to the likes if absent, remove it otherwise.
    /// Returns whether the post is liked afterwards.
    pub fn toggle_like(&mut self, user: ObjectId) -> bool {
        if self.is_liked_by(&user) {
            self.likes.retain(|id| *id != user);
            false
        } else {
            self.likes.push(user);
            true
        }
    }
}

impl IntoIndexes for PostDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "author": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("author_created_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for PostDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_like() {
        let mut post = PostDoc::new(ObjectId::new(), "hello".into(), None);
        let fan = ObjectId::new();

        assert!(post.toggle_like(fan));
        assert!(post.is_liked_by(&fan));
        assert!(!post.toggle_like(fan));
        assert!(post.likes.is_empty());
    }

    #[test]
    fn test_optional_fields_default_on_read() {
        let author = ObjectId::new();
        let post: PostDoc = bson::from_document(doc! {
            "_id": ObjectId::new(),
            "author": author,
            "content": "first post",
        })
        .unwrap();

        assert_eq!(post.author, author);
        assert!(post.image.is_none());
        assert!(post.likes.is_empty());
        assert!(post.comments.is_empty());

        let written = bson::to_document(&post).unwrap();
        assert!(!written.contains_key("image"));
    }
}
