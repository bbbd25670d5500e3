//! Notification inbox: list, mark read, delete

use bson::oid::ObjectId;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::auth::CurrentUser;
use crate::db::schemas::{NotificationDoc, NotificationType, PublicProfile};
use crate::store::SocialStore;
use crate::types::{LinkupError, Result};

/// A notification with its related user expanded
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub related_user: Option<PublicProfile>,
    pub related_post: Option<String>,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

pub struct NotificationService {
    store: Arc<dyn SocialStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    /// The caller's inbox, newest first
    pub async fn list(&self, user: &CurrentUser) -> Result<Vec<NotificationView>> {
        let notifications = self.store.list_notifications(&user.id).await?;

        let mut related: Vec<ObjectId> = notifications
            .iter()
            .filter_map(|n| n.related_user)
            .collect();
        related.sort();
        related.dedup();
        let users = self.store.find_users(&related).await?;

        Ok(notifications
            .into_iter()
            .map(|n| {
                let related_user = n.related_user.and_then(|id| {
                    users
                        .iter()
                        .find(|u| u._id == Some(id))
                        .map(|u| u.public_profile())
                });
                view(n, related_user)
            })
            .collect())
    }

    pub async fn mark_read(
        &self,
        user: &CurrentUser,
        notification_id: &ObjectId,
    ) -> Result<NotificationView> {
        let notification = self
            .store
            .mark_notification_read(notification_id, &user.id)
            .await?
            .ok_or_else(|| LinkupError::NotFound("Notification not found".into()))?;

        debug!(notification_id = %notification_id, user = %user.id, "Notification marked read");
        Ok(view(notification, None))
    }

    /// Delete one of the caller's notifications. Deleting twice is not an error.
    pub async fn delete(&self, user: &CurrentUser, notification_id: &ObjectId) -> Result<()> {
        self.store
            .delete_notification(notification_id, &user.id)
            .await?;
        debug!(notification_id = %notification_id, user = %user.id, "Notification deleted");
        Ok(())
    }
}

fn view(n: NotificationDoc, related_user: Option<PublicProfile>) -> NotificationView {
    NotificationView {
        id: n._id.map(|id| id.to_hex()).unwrap_or_default(),
        notification_type: n.notification_type,
        related_user,
        related_post: n.related_post.map(|id| id.to_hex()),
        read: n.read,
        created_at: n.metadata.created_at.map(|t| t.to_chrono().to_rfc3339()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::UserDoc;
    use crate::store::MemorySocialStore;

    async fn user(store: &MemorySocialStore, username: &str) -> CurrentUser {
        let id = store
            .insert_user(UserDoc::new(
                username.into(),
                username.into(),
                format!("{}@example.com", username),
                "hash".into(),
            ))
            .await
            .unwrap();
        CurrentUser::try_from(store.find_user(&id).await.unwrap().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_list_expands_related_user_newest_first() {
        let store = Arc::new(MemorySocialStore::new());
        let service = NotificationService::new(store.clone());
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;
        let cyd = user(&store, "cyd").await;

        store
            .insert_notification(NotificationDoc::connection_accepted(ada.id, bob.id))
            .await
            .unwrap();
        store
            .insert_notification(NotificationDoc::connection_accepted(ada.id, cyd.id))
            .await
            .unwrap();

        let inbox = service.list(&ada).await.unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].related_user.as_ref().unwrap().username, "cyd");
        assert_eq!(inbox[1].related_user.as_ref().unwrap().username, "bob");
        assert!(inbox.iter().all(|n| !n.read));

        assert!(service.list(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_and_delete_are_owner_scoped() {
        let store = Arc::new(MemorySocialStore::new());
        let service = NotificationService::new(store.clone());
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;

        let id = store
            .insert_notification(NotificationDoc::connection_accepted(ada.id, bob.id))
            .await
            .unwrap();

        let foreign = service.mark_read(&bob, &id).await;
        assert!(matches!(foreign, Err(LinkupError::NotFound(_))));

        let read = service.mark_read(&ada, &id).await.unwrap();
        assert!(read.read);
        assert_eq!(read.id, id.to_hex());

        // Someone else's delete leaves the inbox untouched
        service.delete(&bob, &id).await.unwrap();
        assert_eq!(service.list(&ada).await.unwrap().len(), 1);

        service.delete(&ada, &id).await.unwrap();
        service.delete(&ada, &id).await.unwrap();
        assert!(service.list(&ada).await.unwrap().is_empty());

        let gone = service.mark_read(&ada, &id).await;
        assert!(matches!(gone, Err(LinkupError::NotFound(_))));
    }
}
