// src/event.rs

//! Async event bus for the storefront core.
//!
//! Domain events (catalog changes, cart changes, session transitions,
//! generation completions) are published here after the fact; nothing in the
//! bus participates in a state transition. Subscribers attach either a
//! channel or an async handler, optionally narrowed by an [`EventFilter`].

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::channel::mpsc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, ErrorKind, EventOperation, Result};
use crate::manager::{ManagedState, Manager, ManagerState, ManagerStatus};
use crate::types::Metadata;

/// Base event trait that all events must implement
pub trait Event: Send + Sync + Debug {
    /// Get the event type identifier
    fn event_type(&self) -> &'static str;

    /// Get the event source
    fn source(&self) -> &str;

    /// Get event metadata
    fn metadata(&self) -> &Metadata;

    /// Get event as Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Get event timestamp
    fn timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Get event priority
    fn priority(&self) -> EventPriority {
        EventPriority::Normal
    }
}

/// Event priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventPriority {
    /// Low priority events (background processing)
    Low = 0,
    /// Normal priority events
    Normal = 50,
    /// High priority events (user actions)
    High = 100,
    /// Critical priority events (system alerts)
    Critical = 200,
}

impl Default for EventPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Event handler trait for processing events
#[async_trait]
pub trait EventHandler: Send + Sync + Debug {
    /// Handle an event
    async fn handle(&self, event: &dyn Event) -> Result<()>;

    /// Get handler name for debugging
    fn name(&self) -> &str;

    /// Get event types this handler is interested in
    fn event_types(&self) -> Vec<&'static str>;

    /// Whether this handler should receive all events (wildcard)
    fn is_wildcard(&self) -> bool {
        false
    }
}

/// Event subscription filter
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Event types to match (empty means all)
    pub event_types: Vec<String>,
    /// Source patterns to match; a trailing `*` matches a prefix
    pub source_patterns: Vec<String>,
    /// Minimum priority level
    pub min_priority: Option<EventPriority>,
}

impl EventFilter {
    /// Create a new event filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add event type filter
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    /// Add source pattern filter
    pub fn with_source_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.source_patterns.push(pattern.into());
        self
    }

    /// Require a minimum priority
    pub fn with_min_priority(mut self, priority: EventPriority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    /// Check whether an event passes this filter
    pub fn matches(&self, event: &dyn Event) -> bool {
        if !self.event_types.is_empty()
            && !self
                .event_types
                .iter()
                .any(|t| t == event.event_type())
        {
            return false;
        }

        if !self.source_patterns.is_empty() {
            let source = event.source();
            let matched = self.source_patterns.iter().any(|pattern| {
                match pattern.strip_suffix('*') {
                    Some(prefix) => source.starts_with(prefix),
                    None => pattern == source,
                }
            });
            if !matched {
                return false;
            }
        }

        if let Some(min) = self.min_priority {
            if event.priority() < min {
                return false;
            }
        }

        true
    }
}

/// Delivery statistics for the bus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventStats {
    pub published: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Clone)]
enum SubscriptionSink {
    Channel(mpsc::UnboundedSender<Arc<dyn Event>>),
    Handler(Arc<dyn EventHandler>),
}

struct EventSubscription {
    name: String,
    filter: EventFilter,
    sink: SubscriptionSink,
}

/// Async event bus manager
pub struct EventBusManager {
    state: ManagedState,
    subscriptions: DashMap<Uuid, EventSubscription>,
    stats: RwLock<EventStats>,
}

impl std::fmt::Debug for EventBusManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBusManager")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl EventBusManager {
    pub fn new() -> Self {
        Self {
            state: ManagedState::new(Uuid::new_v4(), "event_bus_manager"),
            subscriptions: DashMap::new(),
            stats: RwLock::new(EventStats::default()),
        }
    }

    /// Publishes an event to all matching subscribers
    pub async fn publish<E: Event + 'static>(&self, event: E) -> Result<()> {
        let event: Arc<dyn Event> = Arc::new(event);
        self.stats.write().published += 1;

        // Snapshot matching sinks first so no shard lock is held across await
        let mut matched: Vec<(Uuid, SubscriptionSink)> = Vec::new();
        for entry in self.subscriptions.iter() {
            let sub = entry.value();
            if !sub.filter.matches(event.as_ref()) {
                continue;
            }
            if let SubscriptionSink::Handler(handler) = &sub.sink {
                if !handler.is_wildcard()
                    && !handler.event_types().contains(&event.event_type())
                {
                    continue;
                }
            }
            matched.push((*entry.key(), sub.sink.clone()));
        }

        let mut closed = Vec::new();
        for (id, sink) in matched {
            match sink {
                SubscriptionSink::Channel(tx) => {
                    if tx.unbounded_send(Arc::clone(&event)).is_ok() {
                        self.stats.write().delivered += 1;
                    } else {
                        self.stats.write().dropped += 1;
                        closed.push(id);
                    }
                }
                SubscriptionSink::Handler(handler) => match handler.handle(event.as_ref()).await {
                    Ok(()) => self.stats.write().delivered += 1,
                    Err(e) => {
                        self.stats.write().failed += 1;
                        tracing::warn!(
                            handler = handler.name(),
                            event_type = event.event_type(),
                            "Event handler failed: {}",
                            e
                        );
                    }
                },
            }
        }

        for id in closed {
            if let Some((_, sub)) = self.subscriptions.remove(&id) {
                tracing::debug!(subscription = %sub.name, "Removing closed event subscription");
            }
        }

        Ok(())
    }

    /// Subscribes with a channel; the receiver yields matching events
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        filter: EventFilter,
    ) -> (Uuid, mpsc::UnboundedReceiver<Arc<dyn Event>>) {
        let (tx, rx) = mpsc::unbounded();
        let id = Uuid::new_v4();
        self.subscriptions.insert(
            id,
            EventSubscription {
                name: name.into(),
                filter,
                sink: SubscriptionSink::Channel(tx),
            },
        );
        (id, rx)
    }

    /// Subscribes an async handler
    pub fn subscribe_with_handler<H: EventHandler + 'static>(
        &self,
        filter: EventFilter,
        handler: H,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let handler = Arc::new(handler);
        self.subscriptions.insert(
            id,
            EventSubscription {
                name: handler.name().to_string(),
                filter,
                sink: SubscriptionSink::Handler(handler),
            },
        );
        id
    }

    /// Removes a subscription
    pub fn unsubscribe(&self, subscription_id: Uuid) -> Result<()> {
        self.subscriptions
            .remove(&subscription_id)
            .map(|_| ())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Event {
                        event_type: None,
                        operation: EventOperation::Unsubscribe,
                    },
                    format!("Unknown subscription {}", subscription_id),
                )
            })
    }

    /// Returns delivery statistics
    pub fn get_stats(&self) -> EventStats {
        self.stats.read().clone()
    }

    /// Returns the number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Default for EventBusManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Manager for EventBusManager {
    fn name(&self) -> &str {
        "event_bus_manager"
    }

    fn id(&self) -> Uuid {
        self.state.id()
    }

    async fn initialize(&mut self) -> Result<()> {
        self.state.set_state(ManagerState::Initializing).await;
        self.state.set_state(ManagerState::Running).await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.state.set_state(ManagerState::ShuttingDown).await;
        self.subscriptions.clear();
        self.state.set_state(ManagerState::Shutdown).await;
        Ok(())
    }

    async fn status(&self) -> ManagerStatus {
        let mut status = self.state.status().await;
        status.add_metadata(
            "subscriptions",
            serde_json::Value::from(self.subscriptions.len()),
        );
        status.add_metadata(
            "stats",
            serde_json::to_value(self.get_stats()).unwrap_or_default(),
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestEvent {
        kind: &'static str,
        source: String,
        metadata: Metadata,
    }

    impl TestEvent {
        fn new(kind: &'static str, source: &str) -> Self {
            Self {
                kind,
                source: source.to_string(),
                metadata: HashMap::new(),
            }
        }
    }

    impl Event for TestEvent {
        fn event_type(&self) -> &'static str {
            self.kind
        }

        fn source(&self) -> &str {
            &self.source
        }

        fn metadata(&self) -> &Metadata {
            &self.metadata
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &dyn Event) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting_handler"
        }

        fn event_types(&self) -> Vec<&'static str> {
            vec!["storefront.cart.changed"]
        }
    }

    #[test]
    fn test_filter_matching() {
        let event = TestEvent::new("storefront.cart.changed", "storefront_manager");

        assert!(EventFilter::new().matches(&event));
        assert!(EventFilter::new()
            .with_event_type("storefront.cart.changed")
            .matches(&event));
        assert!(!EventFilter::new()
            .with_event_type("storefront.catalog.changed")
            .matches(&event));
        assert!(EventFilter::new()
            .with_source_pattern("storefront*")
            .matches(&event));
        assert!(!EventFilter::new()
            .with_source_pattern("generation*")
            .matches(&event));
    }

    #[tokio::test]
    async fn test_channel_subscription_receives_matching_events() {
        let bus = EventBusManager::new();
        let (_id, mut rx) = bus.subscribe(
            "cart_watcher",
            EventFilter::new().with_event_type("storefront.cart.changed"),
        );

        bus.publish(TestEvent::new("storefront.cart.changed", "storefront_manager"))
            .await
            .unwrap();
        bus.publish(TestEvent::new("storefront.catalog.changed", "storefront_manager"))
            .await
            .unwrap();

        let received = rx.next().await.unwrap();
        assert_eq!(received.event_type(), "storefront.cart.changed");
        // The catalog event was filtered out
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn test_handler_subscription() {
        let bus = EventBusManager::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe_with_handler(
            EventFilter::new(),
            CountingHandler {
                count: Arc::clone(&count),
            },
        );

        bus.publish(TestEvent::new("storefront.cart.changed", "storefront_manager"))
            .await
            .unwrap();
        bus.publish(TestEvent::new("storefront.session.changed", "storefront_manager"))
            .await
            .unwrap();

        // Handler declared interest in cart events only
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let stats = bus.get_stats();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.delivered, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = EventBusManager::new();
        let (id, _rx) = bus.subscribe("watcher", EventFilter::new());

        assert_eq!(bus.subscription_count(), 1);
        bus.unsubscribe(id).unwrap();
        assert_eq!(bus.subscription_count(), 0);
        assert!(bus.unsubscribe(id).is_err());
    }
}
