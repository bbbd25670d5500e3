//! User document schema
//!
//! Stores credentials, profile fields and the user's side of the
//! connection graph.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Display name
    pub name: String,

    /// Unique handle, used in profile URLs
    pub username: String,

    /// Unique email address
    pub email: String,

    /// Argon2 password hash
    pub password_hash: String,

    #[serde(default)]
    pub headline: String,

    #[serde(default)]
    pub profile_picture: String,

    #[serde(default)]
    pub about: String,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub skills: Vec<String>,

    /// Mutual connections. Set semantics; symmetry with the peer's list is
    /// maintained by the connection workflow, never by the database.
    #[serde(default)]
    pub connections: Vec<ObjectId>,
}

impl UserDoc {
    /// Create a new user document
    pub fn new(name: String, username: String, email: String, password_hash: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            username,
            email,
            password_hash,
            headline: "Linkup User".to_string(),
            profile_picture: String::new(),
            about: String::new(),
            location: String::new(),
            skills: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Profile fields safe to show to other users
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self._id.map(|id| id.to_hex()).unwrap_or_default(),
            name: self.name.clone(),
            username: self.username.clone(),
            headline: self.headline.clone(),
            profile_picture: self.profile_picture.clone(),
            about: self.about.clone(),
            location: self.location.clone(),
            skills: self.skills.clone(),
            connections: self.connections.iter().map(|id| id.to_hex()).collect(),
        }
    }
}

/// Public view of a user (no email, no password hash)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub headline: String,
    pub profile_picture: String,
    pub about: String,
    pub location: String,
    pub skills: Vec<String>,
    pub connections: Vec<String>,
}

/// Profile fields a user may change about themselves.
///
/// `None` leaves a field as it is. Blank strings are treated as `None`.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub headline: Option<String>,
    pub about: Option<String>,
    pub location: Option<String>,
    pub skills: Option<Vec<String>>,
}

impl ProfileUpdate {
    /// Trim text fields and drop the blank ones
    pub fn normalized(self) -> Self {
        fn text(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            name: text(self.name),
            username: text(self.username),
            headline: text(self.headline),
            about: text(self.about),
            location: text(self.location),
            skills: self.skills.map(|skills| {
                skills
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to an in-memory document
    pub fn apply(&self, user: &mut UserDoc) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(headline) = &self.headline {
            user.headline = headline.clone();
        }
        if let Some(about) = &self.about {
            user.about = about.clone();
        }
        if let Some(location) = &self.location {
            user.location = location.clone();
        }
        if let Some(skills) = &self.skills {
            user.skills = skills.clone();
        }
    }

    /// The `$set` body for the fields present
    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(name) = &self.name {
            set.insert("name", name.as_str());
        }
        if let Some(username) = &self.username {
            set.insert("username", username.as_str());
        }
        if let Some(headline) = &self.headline {
            set.insert("headline", headline.as_str());
        }
        if let Some(about) = &self.about {
            set.insert("about", about.as_str());
        }
        if let Some(location) = &self.location {
            set.insert("location", location.as_str());
        }
        if let Some(skills) = &self.skills {
            set.insert("skills", skills.clone());
        }
        set
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "username": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("username_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
