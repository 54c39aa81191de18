//! Listener registry for interactive components.
//!
//! Two tiers are consulted, in order:
//!
//! 1. **Scoped** listeners, visible only to one [`ActorKey`], consumed by
//!    their first match and unreachable once their TTL has elapsed. The TTL
//!    runs from registration and is never refreshed.
//! 2. **Persistent** listeners, visible to every actor, never expiring and
//!    never consumed.
//!
//! Scoped listeners live in a map sharded by actor. A hit is removed under
//! the shard lock of its actor, so two identical events racing for the same
//! listener can never both consume it. Empty per-actor maps are pruned.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::{debug, trace};

use switchyard_core::ActorKey;

use crate::action::Action;

/// Default lifetime of a scoped listener.
pub const DEFAULT_SCOPED_TTL: Duration = Duration::from_secs(600);

/// Identifies one scoped registration, so that it can be withdrawn without
/// touching a later registration under the same custom id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

#[derive(Debug)]
struct ScopedListener {
    action: Arc<Action>,
    token: ListenerToken,
    expires_at: Instant,
}

impl ScopedListener {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Which tier a component lookup was satisfied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerScope {
    Scoped,
    Persistent,
}

/// A component listener found for an event.
#[derive(Debug, Clone)]
pub struct ComponentMatch {
    pub action: Arc<Action>,
    pub scope: ListenerScope,
}

/// Two-tier registry of component listeners.
#[derive(Debug)]
pub struct ComponentRegistry {
    persistent: DashMap<String, Arc<Action>>,
    scoped: DashMap<ActorKey, HashMap<String, ScopedListener>>,
    default_ttl: Duration,
    next_token: AtomicU64,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPED_TTL)
    }
}

impl ComponentRegistry {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            persistent: DashMap::new(),
            scoped: DashMap::new(),
            default_ttl,
            next_token: AtomicU64::new(1),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Registers a persistent listener under its custom id, replacing any
    /// previous listener with the same id.
    pub fn register(&self, action: impl Into<Arc<Action>>) {
        let action = action.into();
        let custom_id = action.custom_id().to_string();
        let replaced = self.persistent.insert(custom_id.clone(), action).is_some();
        debug!(custom_id = %custom_id, replaced, "Registered persistent listener");
    }

    /// Registers a single-use listener for `actor` with the default TTL.
    pub fn register_scoped(&self, actor: ActorKey, action: impl Into<Arc<Action>>) -> ListenerToken {
        self.register_scoped_with_ttl(actor, action, self.default_ttl)
    }

    /// Registers a single-use listener for `actor` that expires after `ttl`.
    ///
    /// A live listener for the same actor and custom id is replaced.
    pub fn register_scoped_with_ttl(
        &self,
        actor: ActorKey,
        action: impl Into<Arc<Action>>,
        ttl: Duration,
    ) -> ListenerToken {
        let action = action.into();
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let custom_id = action.custom_id().to_string();
        let listener = ScopedListener {
            action,
            token,
            expires_at: Instant::now() + ttl,
        };
        self.scoped
            .entry(actor)
            .or_default()
            .insert(custom_id.clone(), listener);
        debug!(%actor, custom_id = %custom_id, ttl = ?ttl, "Registered scoped listener");
        token
    }

    /// Finds the listener for a component event.
    ///
    /// A live scoped listener for `actor` is consumed and returned first;
    /// otherwise the persistent listener, if any, is returned.
    pub fn lookup(&self, actor: ActorKey, custom_id: &str) -> Option<ComponentMatch> {
        if let Some(action) = self.take_scoped(actor, custom_id) {
            debug!(%actor, custom_id, "Consumed scoped listener");
            return Some(ComponentMatch {
                action,
                scope: ListenerScope::Scoped,
            });
        }
        self.persistent
            .get(custom_id)
            .map(|action| ComponentMatch {
                action: Arc::clone(action.value()),
                scope: ListenerScope::Persistent,
            })
    }

    fn take_scoped(&self, actor: ActorKey, custom_id: &str) -> Option<Arc<Action>> {
        let Entry::Occupied(mut bucket) = self.scoped.entry(actor) else {
            return None;
        };
        let now = Instant::now();
        let hit = bucket
            .get_mut()
            .remove(custom_id)
            .filter(|listener| listener.is_live(now))
            .map(|listener| listener.action);
        bucket.get_mut().retain(|_, listener| listener.is_live(now));
        if bucket.get().is_empty() {
            bucket.remove();
        }
        hit
    }

    /// Withdraws the scoped listener registered with `token`, if it is still
    /// pending. Returns whether anything was removed.
    pub fn withdraw(&self, actor: ActorKey, custom_id: &str, token: ListenerToken) -> bool {
        let Entry::Occupied(mut bucket) = self.scoped.entry(actor) else {
            return false;
        };
        let matches = bucket
            .get()
            .get(custom_id)
            .is_some_and(|listener| listener.token == token);
        if matches {
            bucket.get_mut().remove(custom_id);
        }
        if bucket.get().is_empty() {
            bucket.remove();
        }
        matches
    }

    /// Removes every expired scoped listener. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.scoped.retain(|_, listeners| {
            let before = listeners.len();
            listeners.retain(|_, listener| listener.is_live(now));
            purged += before - listeners.len();
            !listeners.is_empty()
        });
        if purged > 0 {
            trace!(purged, "Purged expired scoped listeners");
        }
        purged
    }

    /// Live scoped listeners pending for `actor`.
    pub fn scoped_len(&self, actor: ActorKey) -> usize {
        let now = Instant::now();
        self.scoped
            .get(&actor)
            .map(|listeners| listeners.values().filter(|l| l.is_live(now)).count())
            .unwrap_or(0)
    }

    /// Identifiers of the live scoped listeners pending for `actor`.
    pub fn scoped_ids(&self, actor: ActorKey) -> Vec<String> {
        let now = Instant::now();
        self.scoped
            .get(&actor)
            .map(|listeners| {
                listeners
                    .iter()
                    .filter(|(_, l)| l.is_live(now))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of actors with at least one stored scoped listener.
    pub fn scoped_actors(&self) -> usize {
        self.scoped.len()
    }

    pub fn persistent_len(&self) -> usize {
        self.persistent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(id: &str) -> Action {
        Action::component(id).build()
    }

    const A: ActorKey = ActorKey {
        channel: switchyard_core::ChannelId(1),
        user: switchyard_core::UserId(10),
    };
    const B: ActorKey = ActorKey {
        channel: switchyard_core::ChannelId(1),
        user: switchyard_core::UserId(20),
    };

    #[tokio::test]
    async fn test_scoped_listener_is_single_use() {
        let registry = ComponentRegistry::default();
        registry.register_scoped(A, component("next"));

        let hit = registry.lookup(A, "next").unwrap();
        assert_eq!(hit.scope, ListenerScope::Scoped);
        assert!(registry.lookup(A, "next").is_none());
        assert_eq!(registry.scoped_actors(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_persistent() {
        let registry = ComponentRegistry::default();
        registry.register(Action::component("next").build());
        registry.register_scoped(A, Action::builder("scoped").build());
        registry.register_scoped(A, component("next"));

        assert_eq!(registry.lookup(A, "next").unwrap().scope, ListenerScope::Scoped);
        let second = registry.lookup(A, "next").unwrap();
        assert_eq!(second.scope, ListenerScope::Persistent);
        assert_eq!(registry.lookup(A, "next").unwrap().scope, ListenerScope::Persistent);
    }

    #[tokio::test]
    async fn test_persistent_reregistration_replaces() {
        let registry = ComponentRegistry::default();
        let first = Arc::new(component("next"));
        let second = Arc::new(component("next"));
        registry.register(Arc::clone(&first));
        registry.register(Arc::clone(&second));

        let hit = registry.lookup(A, "next").unwrap();
        assert_eq!(hit.scope, ListenerScope::Persistent);
        assert!(Arc::ptr_eq(&hit.action, &second));
        assert!(!Arc::ptr_eq(&hit.action, &first));
        assert_eq!(registry.persistent_len(), 1);
    }

    #[tokio::test]
    async fn test_scoped_is_invisible_to_other_actors() {
        let registry = ComponentRegistry::default();
        registry.register_scoped(A, component("next"));

        assert!(registry.lookup(B, "next").is_none());
        assert_eq!(registry.scoped_len(A), 1);
        assert!(registry.lookup(A, "next").is_some());
    }

    #[tokio::test]
    async fn test_bucket_pruned_only_when_empty() {
        let registry = ComponentRegistry::default();
        registry.register_scoped(A, component("yes"));
        registry.register_scoped(A, component("no"));

        registry.lookup(A, "yes").unwrap();
        assert_eq!(registry.scoped_actors(), 1);
        registry.lookup(A, "no").unwrap();
        assert_eq!(registry.scoped_actors(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let registry = ComponentRegistry::default();
        registry.register_scoped_with_ttl(A, component("next"), Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(registry.scoped_len(A), 0);
        assert!(registry.lookup(A, "next").is_none());
        assert_eq!(registry.scoped_actors(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_runs_from_registration() {
        let registry = ComponentRegistry::default();
        registry.register_scoped_with_ttl(A, component("a"), Duration::from_millis(100));
        registry.register_scoped_with_ttl(A, component("b"), Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(registry.lookup(A, "a").is_some());

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(registry.lookup(A, "b").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let registry = ComponentRegistry::default();
        registry.register_scoped_with_ttl(A, component("short"), Duration::from_millis(100));
        registry.register_scoped_with_ttl(A, component("long"), Duration::from_secs(10));
        registry.register_scoped_with_ttl(B, component("short"), Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(registry.purge_expired(), 2);
        assert_eq!(registry.scoped_actors(), 1);
        assert_eq!(registry.scoped_len(A), 1);
    }

    #[tokio::test]
    async fn test_withdraw_respects_token() {
        let registry = ComponentRegistry::default();
        let old = registry.register_scoped(A, component("next"));
        let new = registry.register_scoped(A, component("next"));

        assert!(!registry.withdraw(A, "next", old));
        assert_eq!(registry.scoped_len(A), 1);
        assert!(registry.withdraw(A, "next", new));
        assert_eq!(registry.scoped_actors(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookups_consume_once() {
        let registry = Arc::new(ComponentRegistry::default());
        registry.register_scoped(A, component("next"));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move { registry.lookup(A, "next").is_some() }));
        }

        let mut hits = 0;
        for task in tasks {
            if task.await.unwrap() {
                hits += 1;
            }
        }
        assert_eq!(hits, 1);
    }
}
