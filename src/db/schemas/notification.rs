//! Notification document schema
//!
//! One entry in a user's inbox. The connection workflow writes
//! `connectionAccepted`; the post feed writes `comment` and `like`.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for notifications
pub const NOTIFICATION_COLLECTION: &str = "notifications";

/// Kind of event a notification surfaces.
///
/// Stored as its tag string. Unknown tags are kept verbatim in `Other` so a
/// read followed by a write never rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationType {
    ConnectionAccepted,
    Comment,
    Like,
    Other(String),
}

impl NotificationType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConnectionAccepted => "connectionAccepted",
            Self::Comment => "comment",
            Self::Like => "like",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for NotificationType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "connectionAccepted" => Self::ConnectionAccepted,
            "comment" => Self::Comment,
            "like" => Self::Like,
            _ => Self::Other(tag),
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NotificationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NotificationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

/// Notification stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NotificationDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owner of the inbox entry
    pub recipient: ObjectId,

    #[serde(rename = "type")]
    pub notification_type: NotificationType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_user: Option<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_post: Option<ObjectId>,

    #[serde(default)]
    pub read: bool,
}

impl NotificationDoc {
    /// Unread notification for `recipient`
    pub fn new(recipient: ObjectId, notification_type: NotificationType) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            recipient,
            notification_type,
            related_user: None,
            related_post: None,
            read: false,
        }
    }

    /// Tell `sender` that `accepted_by` accepted their request
    pub fn connection_accepted(sender: ObjectId, accepted_by: ObjectId) -> Self {
        Self {
            related_user: Some(accepted_by),
            ..Self::new(sender, NotificationType::ConnectionAccepted)
        }
    }

    /// Tell a post's author that `actor` commented on or liked it
    pub fn post_activity(
        author: ObjectId,
        notification_type: NotificationType,
        actor: ObjectId,
        post: ObjectId,
    ) -> Self {
        Self {
            related_user: Some(actor),
            related_post: Some(post),
            ..Self::new(author, notification_type)
        }
    }
}

impl IntoIndexes for NotificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "recipient": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("recipient_created_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for NotificationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_accepted_shape() {
        let sender = ObjectId::new();
        let acceptor = ObjectId::new();
        let n = NotificationDoc::connection_accepted(sender, acceptor);
        assert_eq!(n.recipient, sender);
        assert_eq!(n.related_user, Some(acceptor));
        assert_eq!(n.notification_type, NotificationType::ConnectionAccepted);
        assert!(!n.read);
    }

    #[test]
    fn test_type_tag() {
        assert_eq!(
            serde_json::to_string(&NotificationType::ConnectionAccepted).unwrap(),
            "\"connectionAccepted\""
        );
        assert_eq!(serde_json::to_string(&NotificationType::Like).unwrap(), "\"like\"");

        let unknown: NotificationType = serde_json::from_str("\"mention\"").unwrap();
        assert_eq!(unknown, NotificationType::Other("mention".into()));
        assert_eq!(unknown.to_string(), "mention");
    }

    #[test]
    fn test_unknown_tag_survives_document_round_trip() {
        let stored = doc! {
            "_id": ObjectId::new(),
            "recipient": ObjectId::new(),
            "type": "mention",
            "read": false,
        };

        let notification: NotificationDoc = bson::from_document(stored).unwrap();
        assert_eq!(
            notification.notification_type,
            NotificationType::Other("mention".into())
        );

        let written = bson::to_document(&notification).unwrap();
        assert_eq!(written.get_str("type").unwrap(), "mention");

        let known: NotificationDoc = bson::from_document(doc! {
            "recipient": ObjectId::new(),
            "type": "comment",
        })
        .unwrap();
        assert_eq!(known.notification_type, NotificationType::Comment);
        assert!(!known.read);
    }
}
