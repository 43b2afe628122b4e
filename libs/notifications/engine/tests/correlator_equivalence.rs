//! Randomized equivalence of the paged merge-join against the naive
//! nested-loop correlation, across page sizes.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use notify_engine::{
    Content, ContentId, ContentPath, ContentSnapshot, CorrelationSink, FanOutCorrelator,
    InMemorySubscriptionStore, InMemoryUserStore, InMemoryVersionStore, NotifyResult, ObjectKind,
    Subscription, User, UserId,
};

struct CollectingSink {
    pairs: Vec<(UserId, ContentId)>,
}

#[async_trait]
impl CorrelationSink for CollectingSink {
    async fn matched(
        &mut self,
        user: &User,
        content: &Content,
        _previous: Option<&ContentSnapshot>,
    ) -> NotifyResult<()> {
        self.pairs.push((user.id, content.id));
        Ok(())
    }
}

/// The obvious O(users x subscriptions x content) correlation.
fn naive_pairs(
    users: &[User],
    subscriptions: &[Subscription],
    items: &[Content],
    action: &str,
) -> BTreeSet<(UserId, ContentId)> {
    let mut pairs = BTreeSet::new();
    for user in users.iter().filter(|u| u.approved) {
        for subscription in subscriptions {
            if subscription.user_id != user.id || subscription.action != action {
                continue;
            }
            for content in items {
                if content.path.contains(subscription.entity_id) {
                    pairs.insert((user.id, content.id));
                }
            }
        }
    }
    pairs
}

struct Case {
    users: Vec<User>,
    subscriptions: Vec<Subscription>,
    items: Vec<Content>,
}

fn random_case(rng: &mut StdRng) -> Case {
    let entity_pool = [5, 10, 20, 30];
    let actions = ["publish", "unpublish"];

    let user_count = rng.random_range(0..12);
    let mut users = Vec::new();
    let mut subscriptions = Vec::new();
    for id in 1..=user_count {
        users.push(
            User::new(id, format!("User {id}"), format!("user{id}@example.com"))
                .with_approved(rng.random_bool(0.8)),
        );
        for _ in 0..rng.random_range(0..4) {
            subscriptions.push(Subscription::new(
                id,
                entity_pool[rng.random_range(0..entity_pool.len())],
                actions[rng.random_range(0..actions.len())],
            ));
        }
    }

    let item_count = rng.random_range(0..5);
    let mut items = Vec::new();
    for i in 0..item_count {
        let id = 1000 + i;
        let mut path = vec![-1];
        for _ in 0..rng.random_range(0..3) {
            path.push(entity_pool[rng.random_range(0..entity_pool.len())]);
        }
        path.push(id);
        items.push(Content::invariant(
            id,
            format!("Page {id}"),
            ContentPath::new(path),
            vec![],
        ));
    }

    Case {
        users,
        subscriptions,
        items,
    }
}

#[tokio::test]
async fn merge_join_matches_naive_correlation_across_page_sizes() {
    let mut rng = StdRng::seed_from_u64(7);

    for case_index in 0..50 {
        let case = random_case(&mut rng);
        let expected = naive_pairs(&case.users, &case.subscriptions, &case.items, "publish");
        let expected_distinct_ids: BTreeSet<ContentId> =
            expected.iter().map(|(_, content_id)| *content_id).collect();

        for batch_size in [1, 2, 3, 7, 400] {
            let users = Arc::new(InMemoryUserStore::with_users(case.users.clone()));
            let subscriptions = Arc::new(InMemorySubscriptionStore::with_subscriptions(
                case.subscriptions.clone(),
            ));
            let versions = Arc::new(InMemoryVersionStore::new());

            let correlator =
                FanOutCorrelator::new(users, subscriptions, Arc::clone(&versions))
                    .with_batch_size(batch_size);
            let mut sink = CollectingSink { pairs: Vec::new() };
            correlator
                .run(&case.items, "publish", ObjectKind::Document, &mut sink)
                .await
                .unwrap();

            let actual: BTreeSet<(UserId, ContentId)> = sink.pairs.iter().copied().collect();
            assert_eq!(
                actual, expected,
                "case {case_index} with batch size {batch_size} diverged from the naive correlation"
            );
            assert_eq!(
                sink.pairs.len(),
                actual.len(),
                "case {case_index} with batch size {batch_size} emitted a duplicate pair"
            );
            assert_eq!(
                versions.fetches(),
                expected_distinct_ids.len(),
                "case {case_index} with batch size {batch_size} fetched a previous version more than once per content id"
            );
        }
    }
}
