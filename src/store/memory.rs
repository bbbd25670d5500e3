//! In-process [`SocialStore`] backed by `DashMap`
//!
//! Used in dev mode when MongoDB is unreachable, and by the test suite.
//! Per-document atomicity comes from DashMap's shard locks; the unique
//! pending-pair rule is enforced with a reservation map so concurrent sends
//! for the same pair cannot both succeed.

use async_trait::async_trait;
use bson::oid::ObjectId;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::db::schemas::{
    CommentDoc, ConnectionRequestDoc, NotificationDoc, PostDoc, ProfileUpdate, RequestStatus,
    UserDoc,
};
use crate::store::SocialStore;
use crate::types::{LinkupError, Result};

/// A stored document plus its insertion sequence number
struct Slot<T> {
    seq: u64,
    doc: T,
}

#[derive(Default)]
pub struct MemorySocialStore {
    seq: AtomicU64,
    users: DashMap<ObjectId, Slot<UserDoc>>,
    usernames: DashMap<String, ObjectId>,
    emails: DashMap<String, ObjectId>,
    requests: DashMap<ObjectId, Slot<ConnectionRequestDoc>>,
    /// pair_key -> id of the pending request for that pair
    pending_pairs: DashMap<String, ObjectId>,
    notifications: DashMap<ObjectId, Slot<NotificationDoc>>,
    posts: DashMap<ObjectId, Slot<PostDoc>>,
}

impl MemorySocialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of stored connection requests in any status
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// Number of stored notifications across all inboxes
    pub fn notification_count(&self) -> usize {
        self.notifications.len()
    }

    /// Number of live posts
    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    fn reserve(map: &DashMap<String, ObjectId>, key: String, id: ObjectId) -> bool {
        match map.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(id);
                true
            }
        }
    }
}

#[async_trait]
impl SocialStore for MemorySocialStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn insert_user(&self, mut user: UserDoc) -> Result<ObjectId> {
        let id = user._id.unwrap_or_else(ObjectId::new);

        if !Self::reserve(&self.usernames, user.username.clone(), id) {
            return Err(LinkupError::Conflict("Username already taken".into()));
        }
        if !Self::reserve(&self.emails, user.email.to_lowercase(), id) {
            self.usernames.remove(&user.username);
            return Err(LinkupError::Conflict("Email already registered".into()));
        }

        user._id = Some(id);
        user.metadata.stamp_created();
        let seq = self.next_seq();
        self.users.insert(id, Slot { seq, doc: user });
        Ok(id)
    }

    async fn find_user(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        Ok(self.users.get(id).map(|slot| slot.doc.clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDoc>> {
        let id = match self.usernames.get(username) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.find_user(&id).await
    }

    async fn find_users(&self, ids: &[ObjectId]) -> Result<Vec<UserDoc>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|slot| slot.doc.clone()))
            .collect())
    }

    async fn suggest_users(&self, exclude: &[ObjectId], limit: usize) -> Result<Vec<UserDoc>> {
        let mut candidates: Vec<(u64, UserDoc)> = self
            .users
            .iter()
            .filter(|entry| !exclude.contains(entry.key()))
            .map(|entry| (entry.seq, entry.doc.clone()))
            .collect();
        candidates.sort_by_key(|(seq, _)| *seq);

        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|(_, user)| user)
            .collect())
    }

    async fn update_profile(
        &self,
        id: &ObjectId,
        update: &ProfileUpdate,
    ) -> Result<Option<UserDoc>> {
        let current = match self.users.get(id) {
            Some(slot) => slot.doc.username.clone(),
            None => return Ok(None),
        };

        let renamed = match &update.username {
            Some(username) if *username != current => {
                if !Self::reserve(&self.usernames, username.clone(), *id) {
                    return Err(LinkupError::Conflict("Username already taken".into()));
                }
                Some(username.clone())
            }
            _ => None,
        };

        let updated = match self.users.get_mut(id) {
            Some(mut slot) => {
                update.apply(&mut slot.doc);
                slot.doc.metadata.touch();
                slot.doc.clone()
            }
            None => {
                if let Some(username) = renamed {
                    self.usernames.remove_if(&username, |_, owner| owner == id);
                }
                return Ok(None);
            }
        };

        if renamed.is_some() {
            self.usernames.remove_if(&current, |_, owner| owner == id);
        }
        Ok(Some(updated))
    }

    async fn add_connection(&self, user: &ObjectId, peer: &ObjectId) -> Result<()> {
        if let Some(mut slot) = self.users.get_mut(user) {
            if !slot.doc.connections.contains(peer) {
                slot.doc.connections.push(*peer);
                slot.doc.metadata.touch();
            }
        }
        Ok(())
    }

    async fn remove_connection(&self, user: &ObjectId, peer: &ObjectId) -> Result<()> {
        if let Some(mut slot) = self.users.get_mut(user) {
            let before = slot.doc.connections.len();
            slot.doc.connections.retain(|c| c != peer);
            if slot.doc.connections.len() != before {
                slot.doc.metadata.touch();
            }
        }
        Ok(())
    }

    async fn insert_request(&self, mut request: ConnectionRequestDoc) -> Result<ObjectId> {
        let id = request._id.unwrap_or_else(ObjectId::new);

        if request.is_pending()
            && !Self::reserve(&self.pending_pairs, request.pair_key.clone(), id)
        {
            debug!(pair = %request.pair_key, "Pending request already reserved");
            return Err(LinkupError::DuplicateRequest);
        }

        request._id = Some(id);
        request.metadata.stamp_created();
        let seq = self.next_seq();
        self.requests.insert(id, Slot { seq, doc: request });
        Ok(id)
    }

    async fn find_request(&self, id: &ObjectId) -> Result<Option<ConnectionRequestDoc>> {
        Ok(self.requests.get(id).map(|slot| slot.doc.clone()))
    }

    async fn find_pending_between(
        &self,
        a: &ObjectId,
        b: &ObjectId,
    ) -> Result<Option<ConnectionRequestDoc>> {
        let key = crate::db::schemas::pair_key(a, b);
        let id = match self.pending_pairs.get(&key) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self
            .requests
            .get(&id)
            .map(|slot| slot.doc.clone())
            .filter(ConnectionRequestDoc::is_pending))
    }

    async fn list_pending_for(&self, recipient: &ObjectId) -> Result<Vec<ConnectionRequestDoc>> {
        let mut pending: Vec<(u64, ConnectionRequestDoc)> = self
            .requests
            .iter()
            .filter(|entry| entry.doc.recipient == *recipient && entry.doc.is_pending())
            .map(|entry| (entry.seq, entry.doc.clone()))
            .collect();
        pending.sort_by_key(|(seq, _)| *seq);

        Ok(pending.into_iter().map(|(_, r)| r).collect())
    }

    async fn transition_request(&self, id: &ObjectId, to: RequestStatus) -> Result<bool> {
        let pair = {
            let mut slot = match self.requests.get_mut(id) {
                Some(slot) => slot,
                None => return Ok(false),
            };
            if !slot.doc.is_pending() {
                return Ok(false);
            }
            slot.doc.status = to;
            slot.doc.metadata.touch();
            slot.doc.pair_key.clone()
        };

        if to.is_terminal() {
            self.pending_pairs.remove_if(&pair, |_, pending_id| pending_id == id);
        }
        Ok(true)
    }

    async fn insert_notification(&self, mut notification: NotificationDoc) -> Result<ObjectId> {
        let id = notification._id.unwrap_or_else(ObjectId::new);
        notification._id = Some(id);
        notification.metadata.stamp_created();
        let seq = self.next_seq();
        self.notifications.insert(
            id,
            Slot {
                seq,
                doc: notification,
            },
        );
        Ok(id)
    }

    async fn list_notifications(&self, recipient: &ObjectId) -> Result<Vec<NotificationDoc>> {
        let mut inbox: Vec<(u64, NotificationDoc)> = self
            .notifications
            .iter()
            .filter(|entry| entry.doc.recipient == *recipient)
            .map(|entry| (entry.seq, entry.doc.clone()))
            .collect();
        inbox.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(inbox.into_iter().map(|(_, n)| n).collect())
    }

    async fn mark_notification_read(
        &self,
        id: &ObjectId,
        recipient: &ObjectId,
    ) -> Result<Option<NotificationDoc>> {
        match self.notifications.get_mut(id) {
            Some(mut slot) if slot.doc.recipient == *recipient => {
                slot.doc.read = true;
                slot.doc.metadata.touch();
                Ok(Some(slot.doc.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_notification(&self, id: &ObjectId, recipient: &ObjectId) -> Result<()> {
        self.notifications
            .remove_if(id, |_, slot| slot.doc.recipient == *recipient);
        Ok(())
    }

    async fn insert_post(&self, mut post: PostDoc) -> Result<ObjectId> {
        let id = post._id.unwrap_or_else(ObjectId::new);
        post._id = Some(id);
        post.metadata.stamp_created();
        let seq = self.next_seq();
        self.posts.insert(id, Slot { seq, doc: post });
        Ok(id)
    }

    async fn find_post(&self, id: &ObjectId) -> Result<Option<PostDoc>> {
        Ok(self.posts.get(id).map(|slot| slot.doc.clone()))
    }

    async fn list_posts_by_authors(&self, authors: &[ObjectId]) -> Result<Vec<PostDoc>> {
        let mut posts: Vec<(u64, PostDoc)> = self
            .posts
            .iter()
            .filter(|entry| authors.contains(&entry.doc.author))
            .map(|entry| (entry.seq, entry.doc.clone()))
            .collect();
        posts.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(posts.into_iter().map(|(_, p)| p).collect())
    }

    async fn delete_post(&self, id: &ObjectId) -> Result<()> {
        self.posts.remove(id);
        Ok(())
    }

    async fn add_comment(&self, post: &ObjectId, comment: CommentDoc) -> Result<Option<PostDoc>> {
        Ok(self.posts.get_mut(post).map(|mut slot| {
            slot.doc.comments.push(comment);
            slot.doc.metadata.touch();
            slot.doc.clone()
        }))
    }

    async fn toggle_like(
        &self,
        post: &ObjectId,
        user: &ObjectId,
    ) -> Result<Option<(PostDoc, bool)>> {
        Ok(self.posts.get_mut(post).map(|mut slot| {
            let liked = slot.doc.toggle_like(*user);
            slot.doc.metadata.touch();
            (slot.doc.clone(), liked)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::NotificationType;

    fn user(username: &str) -> UserDoc {
        UserDoc::new(
            username.to_string(),
            username.to_string(),
            format!("{}@example.com", username),
            "hash".into(),
        )
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = MemorySocialStore::new();
        store.insert_user(user("ada")).await.unwrap();

        let dup = store.insert_user(user("ada")).await;
        assert!(matches!(dup, Err(LinkupError::Conflict(_))));

        let mut same_email = user("grace");
        same_email.email = "ADA@example.com".into();
        let dup = store.insert_user(same_email).await;
        assert!(matches!(dup, Err(LinkupError::Conflict(_))));

        // The failed insert released its username reservation
        assert!(store.insert_user(user("grace")).await.is_ok());
    }

    #[tokio::test]
    async fn test_connection_set_semantics() {
        let store = MemorySocialStore::new();
        let a = store.insert_user(user("a")).await.unwrap();
        let b = ObjectId::new();

        store.add_connection(&a, &b).await.unwrap();
        store.add_connection(&a, &b).await.unwrap();
        assert_eq!(store.find_user(&a).await.unwrap().unwrap().connections, vec![b]);

        store.remove_connection(&a, &b).await.unwrap();
        store.remove_connection(&a, &b).await.unwrap();
        assert!(store.find_user(&a).await.unwrap().unwrap().connections.is_empty());
    }

    #[tokio::test]
    async fn test_pending_pair_is_unique_in_both_directions() {
        let store = MemorySocialStore::new();
        let (a, b) = (ObjectId::new(), ObjectId::new());

        let id = store
            .insert_request(ConnectionRequestDoc::new(a, b))
            .await
            .unwrap();
        let reverse = store.insert_request(ConnectionRequestDoc::new(b, a)).await;
        assert!(matches!(reverse, Err(LinkupError::DuplicateRequest)));

        let found = store.find_pending_between(&b, &a).await.unwrap().unwrap();
        assert_eq!(found._id, Some(id));

        // Resolving the request frees the pair
        assert!(store
            .transition_request(&id, RequestStatus::Rejected)
            .await
            .unwrap());
        assert!(store.find_pending_between(&a, &b).await.unwrap().is_none());
        assert!(store
            .insert_request(ConnectionRequestDoc::new(b, a))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_transition_only_from_pending() {
        let store = MemorySocialStore::new();
        let id = store
            .insert_request(ConnectionRequestDoc::new(ObjectId::new(), ObjectId::new()))
            .await
            .unwrap();

        assert!(store
            .transition_request(&id, RequestStatus::Accepted)
            .await
            .unwrap());
        assert!(!store
            .transition_request(&id, RequestStatus::Rejected)
            .await
            .unwrap());
        assert!(!store
            .transition_request(&ObjectId::new(), RequestStatus::Accepted)
            .await
            .unwrap());

        let request = store.find_request(&id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn test_concurrent_sends_create_one_request() {
        let store = std::sync::Arc::new(MemorySocialStore::new());
        let (a, b) = (ObjectId::new(), ObjectId::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = std::sync::Arc::clone(&store);
            let request = if i % 2 == 0 {
                ConnectionRequestDoc::new(a, b)
            } else {
                ConnectionRequestDoc::new(b, a)
            };
            handles.push(tokio::spawn(async move { store.insert_request(request).await }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.request_count(), 1);
    }

    #[tokio::test]
    async fn test_notification_inbox_scoping() {
        let store = MemorySocialStore::new();
        let (owner, other) = (ObjectId::new(), ObjectId::new());

        let first = store
            .insert_notification(NotificationDoc::new(owner, NotificationType::Like))
            .await
            .unwrap();
        let second = store
            .insert_notification(NotificationDoc::connection_accepted(owner, other))
            .await
            .unwrap();

        let inbox = store.list_notifications(&owner).await.unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0]._id, Some(second));
        assert_eq!(inbox[1]._id, Some(first));

        assert!(store
            .mark_notification_read(&first, &other)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .mark_notification_read(&first, &owner)
            .await
            .unwrap()
            .unwrap()
            .read);

        store.delete_notification(&first, &other).await.unwrap();
        assert_eq!(store.notification_count(), 2);
        store.delete_notification(&first, &owner).await.unwrap();
        store.delete_notification(&first, &owner).await.unwrap();
        assert_eq!(store.notification_count(), 1);
    }

    #[tokio::test]
    async fn test_rename_moves_username_reservation() {
        let store = MemorySocialStore::new();
        let ada = store.insert_user(user("ada")).await.unwrap();
        store.insert_user(user("bob")).await.unwrap();

        let taken = ProfileUpdate {
            username: Some("bob".into()),
            ..Default::default()
        };
        let result = store.update_profile(&ada, &taken).await;
        assert!(matches!(result, Err(LinkupError::Conflict(_))));

        let rename = ProfileUpdate {
            username: Some("countess".into()),
            headline: Some("Analyst".into()),
            ..Default::default()
        };
        let updated = store.update_profile(&ada, &rename).await.unwrap().unwrap();
        assert_eq!(updated.username, "countess");
        assert_eq!(updated.headline, "Analyst");

        assert!(store.find_user_by_username("ada").await.unwrap().is_none());
        assert_eq!(
            store.find_user_by_username("countess").await.unwrap().unwrap()._id,
            Some(ada)
        );
        // The old handle is free again
        assert!(store.insert_user(user("ada")).await.is_ok());

        assert!(store
            .update_profile(&ObjectId::new(), &rename)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_posts_by_authors_newest_first() {
        let store = MemorySocialStore::new();
        let (a, b, c) = (ObjectId::new(), ObjectId::new(), ObjectId::new());

        let first = store.insert_post(PostDoc::new(a, "one".into(), None)).await.unwrap();
        store.insert_post(PostDoc::new(c, "hidden".into(), None)).await.unwrap();
        let third = store.insert_post(PostDoc::new(b, "three".into(), None)).await.unwrap();

        let feed = store.list_posts_by_authors(&[a, b]).await.unwrap();
        let ids: Vec<_> = feed.iter().map(|p| p._id.unwrap()).collect();
        assert_eq!(ids, vec![third, first]);

        let commented = store
            .add_comment(&first, CommentDoc::new(b, "nice".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(commented.comments.len(), 1);

        let (liked, now_liked) = store.toggle_like(&first, &b).await.unwrap().unwrap();
        assert!(now_liked);
        assert_eq!(liked.likes, vec![b]);
        let (_, now_liked) = store.toggle_like(&first, &b).await.unwrap().unwrap();
        assert!(!now_liked);

        store.delete_post(&first).await.unwrap();
        store.delete_post(&first).await.unwrap();
        assert!(store.find_post(&first).await.unwrap().is_none());
        assert!(store.toggle_like(&first, &b).await.unwrap().is_none());
        assert_eq!(store.post_count(), 2);
    }
}
