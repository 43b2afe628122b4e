//! Store traits and in-memory implementations.
//!
//! The engine reads users, subscriptions, prior content versions, and
//! languages through these traits. The in-memory implementations back the
//! test suites and small deployments.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use crate::error::NotifyResult;
use crate::models::{
    ContentId, ContentSnapshot, EntityId, Language, ObjectKind, Subscription, User, UserId,
};

/// Read access to users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a page of approved users ordered by id, starting after the
    /// given cursor. A page shorter than `page_size` is the last one.
    async fn approved_users_page(
        &self,
        after: Option<UserId>,
        page_size: usize,
    ) -> NotifyResult<Vec<User>>;
}

/// Read and write access to subscriptions.
///
/// The management operations (`subscriptions_for_user` and below) cover
/// document subscriptions; media subscriptions are only reachable through
/// `subscriptions_for`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Fetch every subscription for the given users that matches the action
    /// and object kind, ordered by user id. The order of `user_ids` is
    /// preserved by callers; the result ordering is what the correlator's
    /// merge join relies on.
    async fn subscriptions_for(
        &self,
        user_ids: &[UserId],
        action: &str,
        kind: ObjectKind,
    ) -> NotifyResult<Vec<Subscription>>;

    /// All document subscriptions held by one user.
    async fn subscriptions_for_user(&self, user_id: UserId) -> NotifyResult<Vec<Subscription>>;

    /// All document subscriptions attached to one entity.
    async fn subscriptions_for_entity(&self, entity_id: EntityId)
    -> NotifyResult<Vec<Subscription>>;

    /// Record a new document subscription.
    async fn create(&self, subscription: Subscription) -> NotifyResult<Subscription>;

    /// Remove every document subscription held by one user. Returns the
    /// number removed.
    async fn delete_for_user(&self, user_id: UserId) -> NotifyResult<usize>;

    /// Remove every document subscription attached to one entity. Returns
    /// the number removed.
    async fn delete_for_entity(&self, entity_id: EntityId) -> NotifyResult<usize>;

    /// Remove every document subscription one user holds on one entity.
    /// Returns the number removed.
    async fn delete(&self, user_id: UserId, entity_id: EntityId) -> NotifyResult<usize>;
}

/// Read access to prior content versions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Fetch the most recent stored snapshot of the content item, if any.
    async fn previous_version(&self, content_id: ContentId)
    -> NotifyResult<Option<ContentSnapshot>>;
}

/// Read access to languages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageStore: Send + Sync {
    /// Look up a language by its ISO code, case-insensitively.
    async fn language_by_iso_code(&self, iso_code: &str) -> NotifyResult<Option<Language>>;
}

/// In-memory user store keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<BTreeMap<UserId, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let store = Self::new();
        {
            let mut map = store.users.write();
            for user in users {
                map.insert(user.id, user);
            }
        }
        store
    }

    pub async fn add(&self, user: User) {
        self.users.write().insert(user.id, user);
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn approved_users_page(
        &self,
        after: Option<UserId>,
        page_size: usize,
    ) -> NotifyResult<Vec<User>> {
        let users = self.users.read();
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        Ok(users
            .range((lower, Bound::Unbounded))
            .map(|(_, user)| user)
            .filter(|user| user.approved)
            .take(page_size)
            .cloned()
            .collect())
    }
}

/// In-memory subscription store. Counts batch queries so tests can assert
/// the correlator issues one per user page.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    rows: Arc<RwLock<Vec<(ObjectKind, Subscription)>>>,
    queries: Arc<AtomicUsize>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with document subscriptions.
    pub fn with_subscriptions(subscriptions: Vec<Subscription>) -> Self {
        let store = Self::new();
        {
            let mut rows = store.rows.write();
            for subscription in subscriptions {
                rows.push((ObjectKind::Document, subscription));
            }
        }
        store
    }

    /// Add a document subscription.
    pub async fn add(&self, subscription: Subscription) {
        self.rows.write().push((ObjectKind::Document, subscription));
    }

    /// Add a media subscription.
    pub async fn add_media(&self, subscription: Subscription) {
        self.rows.write().push((ObjectKind::Media, subscription));
    }

    /// Number of `subscriptions_for` calls issued so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn subscriptions_for(
        &self,
        user_ids: &[UserId],
        action: &str,
        kind: ObjectKind,
    ) -> NotifyResult<Vec<Subscription>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.read();
        let mut matched: Vec<Subscription> = rows
            .iter()
            .filter(|(row_kind, subscription)| {
                *row_kind == kind
                    && subscription.action == action
                    && user_ids.contains(&subscription.user_id)
            })
            .map(|(_, subscription)| subscription.clone())
            .collect();
        matched.sort_by_key(|subscription| subscription.user_id);
        Ok(matched)
    }

    async fn subscriptions_for_user(&self, user_id: UserId) -> NotifyResult<Vec<Subscription>> {
        let rows = self.rows.read();
        Ok(rows
            .iter()
            .filter(|(kind, subscription)| {
                *kind == ObjectKind::Document && subscription.user_id == user_id
            })
            .map(|(_, subscription)| subscription.clone())
            .collect())
    }

    async fn subscriptions_for_entity(
        &self,
        entity_id: EntityId,
    ) -> NotifyResult<Vec<Subscription>> {
        let rows = self.rows.read();
        Ok(rows
            .iter()
            .filter(|(kind, subscription)| {
                *kind == ObjectKind::Document && subscription.entity_id == entity_id
            })
            .map(|(_, subscription)| subscription.clone())
            .collect())
    }

    async fn create(&self, subscription: Subscription) -> NotifyResult<Subscription> {
        info!(
            user_id = subscription.user_id,
            entity_id = subscription.entity_id,
            action = %subscription.action,
            "creating subscription"
        );
        self.rows
            .write()
            .push((ObjectKind::Document, subscription.clone()));
        Ok(subscription)
    }

    async fn delete_for_user(&self, user_id: UserId) -> NotifyResult<usize> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|(kind, subscription)| {
            *kind != ObjectKind::Document || subscription.user_id != user_id
        });
        let removed = before - rows.len();
        info!(user_id, removed, "deleted user subscriptions");
        Ok(removed)
    }

    async fn delete_for_entity(&self, entity_id: EntityId) -> NotifyResult<usize> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|(kind, subscription)| {
            *kind != ObjectKind::Document || subscription.entity_id != entity_id
        });
        let removed = before - rows.len();
        info!(entity_id, removed, "deleted entity subscriptions");
        Ok(removed)
    }

    async fn delete(&self, user_id: UserId, entity_id: EntityId) -> NotifyResult<usize> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|(kind, subscription)| {
            *kind != ObjectKind::Document
                || subscription.user_id != user_id
                || subscription.entity_id != entity_id
        });
        Ok(before - rows.len())
    }
}

/// In-memory version store. Counts fetches so tests can assert the
/// correlator memoizes lookups.
#[derive(Debug, Default)]
pub struct InMemoryVersionStore {
    snapshots: Arc<RwLock<HashMap<ContentId, ContentSnapshot>>>,
    fetches: Arc<AtomicUsize>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshots(snapshots: Vec<ContentSnapshot>) -> Self {
        let store = Self::new();
        {
            let mut map = store.snapshots.write();
            for snapshot in snapshots {
                map.insert(snapshot.id, snapshot);
            }
        }
        store
    }

    pub async fn set(&self, snapshot: ContentSnapshot) {
        self.snapshots.write().insert(snapshot.id, snapshot);
    }

    /// Number of `previous_version` calls issued so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn previous_version(
        &self,
        content_id: ContentId,
    ) -> NotifyResult<Option<ContentSnapshot>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshots.read().get(&content_id).cloned())
    }
}

/// In-memory language store keyed by lowercased ISO code.
#[derive(Debug, Default)]
pub struct InMemoryLanguageStore {
    languages: Arc<RwLock<HashMap<String, Language>>>,
}

impl InMemoryLanguageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_languages(languages: Vec<Language>) -> Self {
        let store = Self::new();
        {
            let mut map = store.languages.write();
            for language in languages {
                map.insert(language.iso_code.to_lowercase(), language);
            }
        }
        store
    }

    pub async fn add(&self, language: Language) {
        self.languages
            .write()
            .insert(language.iso_code.to_lowercase(), language);
    }
}

#[async_trait]
impl LanguageStore for InMemoryLanguageStore {
    async fn language_by_iso_code(&self, iso_code: &str) -> NotifyResult<Option<Language>> {
        Ok(self.languages.read().get(&iso_code.to_lowercase()).cloned())
    }
}
