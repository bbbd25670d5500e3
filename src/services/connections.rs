//! Connection workflow
//!
//! Sends, accepts and rejects connection requests and maintains the
//! symmetric `connections` edge between two users.
//!
//! Accept is a short saga of single-document writes:
//!
//! 1. flip the request `pending -> accepted` (conditional, so a replay is a no-op)
//! 2. add the acceptor to the sender's connections
//! 3. add the sender to the acceptor's connections
//! 4. notify the sender
//!
//! Steps 2 and 3 are set-adds and safe to repeat. The sender's record is
//! read with the request, before any write; the acceptance email built from
//! it is dispatched on a detached task after step 4 and can never fail the
//! call.

use bson::oid::ObjectId;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::db::schemas::{
    ConnectionRequestDoc, NotificationDoc, PublicProfile, RequestStatus,
};
use crate::services::mailer::{self, ConnectionAcceptedEmail, Mailer};
use crate::store::SocialStore;
use crate::types::{LinkupError, Result};

/// Relationship between the caller and another user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    /// The caller sent a request that is still pending
    Pending,
    /// The other user sent the caller a pending request
    Received {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    NotConnected,
}

/// A pending request as shown in the recipient's inbox
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRequest {
    pub id: String,
    pub sender: PublicProfile,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Result of a successful accept
#[derive(Debug)]
pub struct AcceptOutcome {
    pub request_id: ObjectId,
    pub sender_id: ObjectId,
    /// Background email delivery; `None` when the sender has no record to mail
    pub email_task: Option<JoinHandle<()>>,
}

pub struct ConnectionWorkflow {
    store: Arc<dyn SocialStore>,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl ConnectionWorkflow {
    pub fn new(store: Arc<dyn SocialStore>, mailer: Arc<dyn Mailer>, frontend_url: String) -> Self {
        Self {
            store,
            mailer,
            frontend_url,
        }
    }

    /// Send a connection request from `user` to `target`.
    ///
    /// Checked in order: self-request, existing connection, pending request
    /// in either direction. The store enforces the pending-pair rule again on
    /// insert, so two racing sends cannot both succeed.
    pub async fn send_request(
        &self,
        user: &CurrentUser,
        target: &ObjectId,
    ) -> Result<ConnectionRequestDoc> {
        if *target == user.id {
            return Err(LinkupError::InvalidOperation(
                "You can't send a request to yourself".into(),
            ));
        }

        if user.is_connected_to(target) {
            return Err(LinkupError::AlreadyConnected);
        }

        if self
            .store
            .find_pending_between(&user.id, target)
            .await?
            .is_some()
        {
            return Err(LinkupError::DuplicateRequest);
        }

        let mut request = ConnectionRequestDoc::new(user.id, *target);
        let id = self.store.insert_request(request.clone()).await?;
        request._id = Some(id);

        info!(request_id = %id, sender = %user.id, recipient = %target, "Connection request sent");
        Ok(request)
    }

    /// Accept a pending request addressed to `user`
    pub async fn accept_request(
        &self,
        user: &CurrentUser,
        request_id: &ObjectId,
    ) -> Result<AcceptOutcome> {
        let request = self.load_for_recipient(user, request_id, "accept").await?;
        let sender_id = request.sender;
        let email = self.accepted_email(user, &sender_id).await?;

        if !self
            .store
            .transition_request(request_id, RequestStatus::Accepted)
            .await?
        {
            // Lost a race with another accept/reject on the same request
            return Err(LinkupError::AlreadyProcessed);
        }

        self.store.add_connection(&sender_id, &user.id).await?;
        self.store.add_connection(&user.id, &sender_id).await?;

        self.store
            .insert_notification(NotificationDoc::connection_accepted(sender_id, user.id))
            .await?;

        info!(
            request_id = %request_id,
            sender = %sender_id,
            recipient = %user.id,
            "Connection request accepted"
        );

        let email_task =
            email.map(|email| mailer::spawn_connection_accepted(self.mailer.clone(), email));

        Ok(AcceptOutcome {
            request_id: *request_id,
            sender_id,
            email_task,
        })
    }

    /// Reject a pending request addressed to `user`. No graph change, no notification.
    pub async fn reject_request(&self, user: &CurrentUser, request_id: &ObjectId) -> Result<()> {
        self.load_for_recipient(user, request_id, "reject").await?;

        if !self
            .store
            .transition_request(request_id, RequestStatus::Rejected)
            .await?
        {
            return Err(LinkupError::AlreadyProcessed);
        }

        info!(request_id = %request_id, recipient = %user.id, "Connection request rejected");
        Ok(())
    }

    /// Pending requests addressed to `user`, each with the sender's profile
    pub async fn list_incoming(&self, user: &CurrentUser) -> Result<Vec<IncomingRequest>> {
        let requests = self.store.list_pending_for(&user.id).await?;

        let sender_ids: Vec<ObjectId> = requests.iter().map(|r| r.sender).collect();
        let senders = self.store.find_users(&sender_ids).await?;

        Ok(requests
            .into_iter()
            .filter_map(|request| {
                let sender = senders
                    .iter()
                    .find(|u| u._id == Some(request.sender))?
                    .public_profile();
                Some(IncomingRequest {
                    id: request._id.map(|id| id.to_hex()).unwrap_or_default(),
                    sender,
                    status: request.status,
                    created_at: request
                        .metadata
                        .created_at
                        .map(|t| t.to_chrono().to_rfc3339()),
                })
            })
            .collect())
    }

    /// Public profiles of everyone `user` is connected to
    pub async fn list_connections(&self, user: &CurrentUser) -> Result<Vec<PublicProfile>> {
        let ids: Vec<ObjectId> = user.connections.iter().copied().collect();
        let users = self.store.find_users(&ids).await?;
        Ok(users.iter().map(|u| u.public_profile()).collect())
    }

    /// Drop the edge between `user` and `other` on both sides. Always succeeds
    /// when the store is reachable, whether or not the edge existed.
    pub async fn remove_connection(&self, user: &CurrentUser, other: &ObjectId) -> Result<()> {
        self.store.remove_connection(&user.id, other).await?;
        self.store.remove_connection(other, &user.id).await?;

        info!(user = %user.id, other = %other, "Connection removed");
        Ok(())
    }

    pub async fn connection_status(
        &self,
        user: &CurrentUser,
        target: &ObjectId,
    ) -> Result<ConnectionStatus> {
        if user.is_connected_to(target) {
            return Ok(ConnectionStatus::Connected);
        }

        let status = match self.store.find_pending_between(&user.id, target).await? {
            Some(request) if request.sender == user.id => ConnectionStatus::Pending,
            Some(request) if request.sender == *target => ConnectionStatus::Received {
                request_id: request._id.map(|id| id.to_hex()).unwrap_or_default(),
            },
            _ => ConnectionStatus::NotConnected,
        };
        Ok(status)
    }

    /// Shared guards of accept and reject: exists, addressed to `user`, still pending
    async fn load_for_recipient(
        &self,
        user: &CurrentUser,
        request_id: &ObjectId,
        action: &str,
    ) -> Result<ConnectionRequestDoc> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or_else(|| LinkupError::NotFound("Connection request not found".into()))?;

        if request.recipient != user.id {
            return Err(LinkupError::Forbidden(format!(
                "Not authorized to {} this request",
                action
            )));
        }

        if !request.is_pending() {
            return Err(LinkupError::AlreadyProcessed);
        }

        Ok(request)
    }

    /// The email for the sender, or `None` when the sender has no record
    async fn accepted_email(
        &self,
        user: &CurrentUser,
        sender_id: &ObjectId,
    ) -> Result<Option<ConnectionAcceptedEmail>> {
        let Some(sender) = self.store.find_user(sender_id).await? else {
            warn!(sender = %sender_id, "Sender missing, skipping acceptance email");
            return Ok(None);
        };

        Ok(Some(ConnectionAcceptedEmail {
            to: sender.email,
            sender_name: sender.name,
            recipient_name: user.name.clone(),
            profile_url: mailer::profile_url(&self.frontend_url, &user.username),
        }))
    }
}
