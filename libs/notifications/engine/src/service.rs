//! Notification service.
//!
//! Ties the correlator, summarizer, composer, and dispatcher together and
//! exposes the subscription management surface.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use crate::composer::{MailComposer, NotificationTemplates};
use crate::config::NotificationConfig;
use crate::correlator::{CorrelationSink, FanOutCorrelator};
use crate::dispatch::Dispatcher;
use crate::error::{NotifyError, NotifyResult};
use crate::models::{
    Content, ContentPath, ContentSnapshot, EntityId, ObjectKind, Subscription, User, UserId,
};
use crate::store::{LanguageStore, SubscriptionStore, UserStore, VersionStore};
use crate::summary::DiffSummarizer;

/// Fan-out entry point plus subscription management.
pub struct NotificationService<U, S, V, L> {
    users: Arc<U>,
    subscriptions: Arc<S>,
    versions: Arc<V>,
    languages: Arc<L>,
    dispatcher: Dispatcher,
    config: NotificationConfig,
}

impl<U, S, V, L> NotificationService<U, S, V, L>
where
    U: UserStore,
    S: SubscriptionStore,
    V: VersionStore,
    L: LanguageStore,
{
    pub fn new(
        users: Arc<U>,
        subscriptions: Arc<S>,
        versions: Arc<V>,
        languages: Arc<L>,
        dispatcher: Dispatcher,
        config: NotificationConfig,
    ) -> NotifyResult<Self> {
        config.validate()?;
        Ok(Self {
            users,
            subscriptions,
            versions,
            languages,
            dispatcher,
            config,
        })
    }

    /// Fan a content action out to every subscribed, approved user.
    ///
    /// `action` is the subscription key (e.g. `publish`); `action_name` is
    /// the display form used in subjects and bodies. Returns once every
    /// matched notification is queued; delivery itself is asynchronous.
    pub async fn send_notifications(
        &self,
        acting_user: &User,
        items: &[Content],
        action: &str,
        action_name: &str,
        site_url: &Url,
        templates: &dyn NotificationTemplates,
    ) -> NotifyResult<()> {
        if action.trim().is_empty() {
            return Err(NotifyError::InvalidInput(
                "action must not be empty".to_string(),
            ));
        }

        let correlator = FanOutCorrelator::new(
            Arc::clone(&self.users),
            Arc::clone(&self.subscriptions),
            Arc::clone(&self.versions),
        )
        .with_batch_size(self.config.user_batch_size);
        let summarizer = DiffSummarizer::new(
            Arc::clone(&self.languages),
            !self.config.disable_html_email,
        );
        let composer = MailComposer::new(&self.config);

        let mut sink = ComposeSink {
            acting_user,
            action_name,
            site_url,
            templates,
            summarizer: &summarizer,
            composer: &composer,
            dispatcher: &self.dispatcher,
            queued: 0,
        };
        correlator
            .run(items, action, ObjectKind::Document, &mut sink)
            .await?;

        info!(
            action,
            items = items.len(),
            queued = sink.queued,
            "queued notifications"
        );
        Ok(())
    }

    /// All document subscriptions held by one user.
    pub async fn user_subscriptions(&self, user_id: UserId) -> NotifyResult<Vec<Subscription>> {
        self.subscriptions.subscriptions_for_user(user_id).await
    }

    /// The user's document subscriptions on the given path's entities.
    pub async fn user_subscriptions_in_path(
        &self,
        user_id: UserId,
        path: &ContentPath,
    ) -> NotifyResult<Vec<Subscription>> {
        let subscriptions = self.subscriptions.subscriptions_for_user(user_id).await?;
        Ok(subscriptions
            .into_iter()
            .filter(|s| path.contains(s.entity_id))
            .collect())
    }

    /// All document subscriptions attached to one entity.
    pub async fn entity_subscriptions(
        &self,
        entity_id: EntityId,
    ) -> NotifyResult<Vec<Subscription>> {
        self.subscriptions.subscriptions_for_entity(entity_id).await
    }

    /// Subscribe a user to an action on an entity.
    pub async fn create_subscription(
        &self,
        user_id: UserId,
        entity_id: EntityId,
        action: &str,
    ) -> NotifyResult<Subscription> {
        if action.trim().is_empty() {
            return Err(NotifyError::InvalidInput(
                "action must not be empty".to_string(),
            ));
        }
        self.subscriptions
            .create(Subscription::new(user_id, entity_id, action))
            .await
    }

    /// Replace the user's subscriptions on one entity with the given
    /// actions. Repeated actions are stored once.
    pub async fn set_subscriptions(
        &self,
        user_id: UserId,
        entity_id: EntityId,
        actions: &[&str],
    ) -> NotifyResult<Vec<Subscription>> {
        self.subscriptions.delete(user_id, entity_id).await?;
        let mut created = Vec::new();
        for action in actions {
            if created.iter().any(|s: &Subscription| s.action == *action) {
                continue;
            }
            created.push(
                self.subscriptions
                    .create(Subscription::new(user_id, entity_id, *action))
                    .await?,
            );
        }
        Ok(created)
    }

    /// Remove every subscription held by one user.
    pub async fn delete_user_subscriptions(&self, user_id: UserId) -> NotifyResult<usize> {
        self.subscriptions.delete_for_user(user_id).await
    }

    /// Remove every subscription attached to one entity.
    pub async fn delete_entity_subscriptions(&self, entity_id: EntityId) -> NotifyResult<usize> {
        self.subscriptions.delete_for_entity(entity_id).await
    }

    /// Remove one user's subscriptions on one entity.
    pub async fn delete_subscriptions(
        &self,
        user_id: UserId,
        entity_id: EntityId,
    ) -> NotifyResult<usize> {
        self.subscriptions.delete(user_id, entity_id).await
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }
}

/// Summarizes, composes, and queues each correlation match.
struct ComposeSink<'a, L> {
    acting_user: &'a User,
    action_name: &'a str,
    site_url: &'a Url,
    templates: &'a dyn NotificationTemplates,
    summarizer: &'a DiffSummarizer<L>,
    composer: &'a MailComposer,
    dispatcher: &'a Dispatcher,
    queued: usize,
}

#[async_trait]
impl<L: LanguageStore> CorrelationSink for ComposeSink<'_, L> {
    async fn matched(
        &mut self,
        user: &User,
        content: &Content,
        previous: Option<&ContentSnapshot>,
    ) -> NotifyResult<()> {
        if user.email.trim().is_empty() {
            warn!(
                user_id = user.id,
                user = %user.name,
                "subscriber has no email address, skipping"
            );
            return Ok(());
        }

        let summary = self.summarizer.summarize(content, previous).await?;
        let request = self.composer.compose(
            self.acting_user,
            user,
            content,
            summary,
            self.action_name,
            self.site_url,
            self.templates,
        )?;
        self.dispatcher.enqueue(request);
        self.queued += 1;
        Ok(())
    }
}
