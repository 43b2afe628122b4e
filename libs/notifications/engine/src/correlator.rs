//! Fan-out correlation of content changes to subscribed users.
//!
//! Users are paged out of the store in id order and joined against their
//! subscriptions with a single merge pass per page. Both sides arrive
//! sorted by user id, so the join never rescans either side.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::config::DEFAULT_USER_BATCH_SIZE;
use crate::error::NotifyResult;
use crate::models::{Content, ContentId, ContentSnapshot, ObjectKind, Subscription, User};
use crate::store::{SubscriptionStore, UserStore, VersionStore};

/// Receives each (user, content) match the correlator produces.
#[async_trait]
pub trait CorrelationSink: Send {
    async fn matched(
        &mut self,
        user: &User,
        content: &Content,
        previous: Option<&ContentSnapshot>,
    ) -> NotifyResult<()>;
}

/// Pages approved users, joins them against their subscriptions, and emits
/// one match per (user, content item) pair.
pub struct FanOutCorrelator<U, S, V> {
    users: Arc<U>,
    subscriptions: Arc<S>,
    versions: Arc<V>,
    batch_size: usize,
}

impl<U, S, V> FanOutCorrelator<U, S, V>
where
    U: UserStore,
    S: SubscriptionStore,
    V: VersionStore,
{
    pub fn new(users: Arc<U>, subscriptions: Arc<S>, versions: Arc<V>) -> Self {
        Self {
            users,
            subscriptions,
            versions,
            batch_size: DEFAULT_USER_BATCH_SIZE,
        }
    }

    /// Set the user page size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Correlate the given content items against every approved user's
    /// subscriptions, emitting matches into the sink.
    ///
    /// Issues one user query and one subscription query per page, and at
    /// most one version lookup per distinct content id across the whole
    /// call.
    pub async fn run(
        &self,
        items: &[Content],
        action: &str,
        kind: ObjectKind,
        sink: &mut dyn CorrelationSink,
    ) -> NotifyResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        // Version lookups are memoized for the whole pass, including the
        // "no previous version" answer.
        let mut previous: HashMap<ContentId, Option<ContentSnapshot>> = HashMap::new();
        let mut after: Option<_> = None;

        loop {
            let batch = self.users.approved_users_page(after, self.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            after = batch.last().map(|user| user.id);

            let user_ids: Vec<_> = batch.iter().map(|user| user.id).collect();
            let subscriptions = self
                .subscriptions
                .subscriptions_for(&user_ids, action, kind)
                .await?;
            debug!(
                users = batch.len(),
                subscriptions = subscriptions.len(),
                action,
                "correlating user batch"
            );

            if !subscriptions.is_empty() {
                self.join_batch(&batch, &subscriptions, items, &mut previous, sink)
                    .await?;
            }

            if batch.len() < self.batch_size {
                break;
            }
        }

        Ok(())
    }

    /// Merge-join one page of users against its subscriptions. Both inputs
    /// are ordered by user id.
    async fn join_batch(
        &self,
        users: &[User],
        subscriptions: &[Subscription],
        items: &[Content],
        previous: &mut HashMap<ContentId, Option<ContentSnapshot>>,
        sink: &mut dyn CorrelationSink,
    ) -> NotifyResult<()> {
        let mut i = 0;
        for user in users {
            if i >= subscriptions.len() {
                break;
            }
            if subscriptions[i].user_id != user.id {
                continue;
            }

            // One user may hold overlapping subscriptions (an entity and
            // its ancestor); each content item is emitted at most once.
            let mut seen: Vec<ContentId> = Vec::new();
            while i < subscriptions.len() && subscriptions[i].user_id == user.id {
                let entity_id = subscriptions[i].entity_id;
                for content in items {
                    if !content.path.contains(entity_id) || seen.contains(&content.id) {
                        continue;
                    }
                    seen.push(content.id);

                    if !previous.contains_key(&content.id) {
                        let snapshot = self.versions.previous_version(content.id).await?;
                        previous.insert(content.id, snapshot);
                    }
                    let prev = previous.get(&content.id).and_then(|p| p.as_ref());

                    trace!(user_id = user.id, content_id = content.id, "subscription match");
                    sink.matched(user, content, prev).await?;
                }
                i += 1;
            }
        }
        Ok(())
    }
}
