//! Connection request document schema
//!
//! A directed request from `sender` to `recipient`. Status only ever moves
//! `pending -> accepted` or `pending -> rejected`; documents are kept after
//! they reach a terminal status.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for connection requests
pub const CONNECTION_REQUEST_COLLECTION: &str = "connection_requests";

/// Lifecycle of a connection request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Accepted and rejected requests never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection request stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConnectionRequestDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub sender: ObjectId,

    pub recipient: ObjectId,

    #[serde(default)]
    pub status: RequestStatus,

    /// Order-independent key of {sender, recipient}, see [`pair_key`]
    pub pair_key: String,
}

impl ConnectionRequestDoc {
    /// New pending request
    pub fn new(sender: ObjectId, recipient: ObjectId) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            sender,
            recipient,
            status: RequestStatus::Pending,
            pair_key: pair_key(&sender, &recipient),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// Key identifying an unordered pair of users: `pair_key(a, b) == pair_key(b, a)`
pub fn pair_key(a: &ObjectId, b: &ObjectId) -> String {
    let (a, b) = (a.to_hex(), b.to_hex());
    if a <= b {
        format!("{}:{}", a, b)
    } else {
        format!("{}:{}", b, a)
    }
}

impl IntoIndexes for ConnectionRequestDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // At most one pending request per unordered pair
            (
                doc! { "pair_key": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "status": "pending" })
                        .name("pending_pair_unique".to_string())
                        .build(),
                ),
            ),
            // Incoming request listing
            (
                doc! { "recipient": 1, "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("recipient_status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ConnectionRequestDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_eq!(pair_key(&a, &b), pair_key(&b, &a));
        assert_ne!(pair_key(&a, &b), pair_key(&a, &a));
    }

    #[test]
    fn test_new_request_is_pending() {
        let request = ConnectionRequestDoc::new(ObjectId::new(), ObjectId::new());
        assert!(request.is_pending());
        assert!(!request.status.is_terminal());
        assert!(RequestStatus::Accepted.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::Accepted).unwrap(),
            "\"accepted\""
        );
        let status: RequestStatus = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(status, RequestStatus::Rejected);
    }
}
