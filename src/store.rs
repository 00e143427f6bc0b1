// src/store.rs - Storefront state, actions, and reducer

//! The single mutation path for storefront state. Every user action becomes
//! an [`Action`] dispatched to the [`StorefrontManager`]; a pure reducer
//! produces the successor state or a validation error. On failure the prior
//! state is kept untouched; on success the new state replaces the old and a
//! [`StoreEvent`] is published. Operations referencing unknown identifiers
//! are deliberate no-ops so stale references never fault.

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::cart::{Cart, CartTotals, ShippingPolicy};
use crate::catalog::{Catalog, ImportReport, OfferSuggestion, Product, Review};
use crate::config::{SessionConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::event::{Event, EventBusManager, EventPriority};
use crate::manager::{ManagedState, Manager, ManagerState, ManagerStatus};
use crate::session::{self, RegistrationRequest, User, UserRole};
use crate::types::{Metadata, ProductId};
use crate::utils::validation;

/// The explicit application-state struct: everything a session mutates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorefrontState {
    pub catalog: Catalog,
    pub cart: Cart,
    pub user: Option<User>,
}

/// A user-initiated state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    AddProduct(Product),
    RemoveProduct(ProductId),
    UpdateProduct(Product),
    ApplyOffers(Vec<OfferSuggestion>),
    AddReview {
        product_id: ProductId,
        review: Review,
    },
    AddToCart {
        product_id: ProductId,
        size: f32,
        quantity: u32,
    },
    RemoveFromCart {
        product_id: ProductId,
        size: f32,
    },
    UpdateCartQuantity {
        product_id: ProductId,
        size: f32,
        delta: i64,
    },
    ClearCart,
    Login {
        name: String,
        email: String,
        role: UserRole,
    },
    Register(RegistrationRequest),
    Logout,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddProduct(_) => "add_product",
            Self::RemoveProduct(_) => "remove_product",
            Self::UpdateProduct(_) => "update_product",
            Self::ApplyOffers(_) => "apply_offers",
            Self::AddReview { .. } => "add_review",
            Self::AddToCart { .. } => "add_to_cart",
            Self::RemoveFromCart { .. } => "remove_from_cart",
            Self::UpdateCartQuantity { .. } => "update_cart_quantity",
            Self::ClearCart => "clear_cart",
            Self::Login { .. } => "login",
            Self::Register(_) => "register",
            Self::Logout => "logout",
        }
    }

    /// Event type a successful transition publishes under
    pub fn topic(&self) -> &'static str {
        match self {
            Self::AddProduct(_)
            | Self::RemoveProduct(_)
            | Self::UpdateProduct(_)
            | Self::ApplyOffers(_)
            | Self::AddReview { .. } => "storefront.catalog.changed",
            Self::AddToCart { .. }
            | Self::RemoveFromCart { .. }
            | Self::UpdateCartQuantity { .. }
            | Self::ClearCart => "storefront.cart.changed",
            Self::Login { .. } | Self::Register(_) | Self::Logout => {
                "storefront.session.changed"
            }
        }
    }
}

/// Policy knobs the reducer and totals need, lifted out of configuration
#[derive(Debug, Clone, Default)]
pub struct StorePolicy {
    pub shipping: ShippingPolicy,
    pub session: SessionConfig,
}

impl StorePolicy {
    pub fn from_config(store: &StoreConfig, session: SessionConfig) -> Self {
        Self {
            shipping: ShippingPolicy::from(store),
            session,
        }
    }
}

fn validate_review(review: &Review) -> Result<()> {
    let mut errors = Vec::new();
    if !validation::is_non_empty(&review.user_name) {
        errors.push("Reviewer name is required".to_string());
    }
    if !validation::is_non_empty(&review.comment) {
        errors.push("Review comment is required".to_string());
    }
    if !validation::is_valid_rating(review.rating) {
        errors.push("Rating must be between 1 and 5".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::validation_rules("review", errors).source("storefront"))
    }
}

/// Pure state transition. Returns the successor state, or an error with the
/// guarantee that the caller's state is untouched.
pub fn reduce(
    state: &StorefrontState,
    action: &Action,
    policy: &StorePolicy,
) -> Result<StorefrontState> {
    let mut next = state.clone();

    match action {
        Action::AddProduct(product) => {
            let errors = product.validate();
            if !errors.is_empty() {
                return Err(Error::validation_rules("product", errors).source("storefront"));
            }
            next.catalog.add(product.clone());
        }
        Action::RemoveProduct(product_id) => {
            next.catalog.remove(product_id);
        }
        Action::UpdateProduct(product) => {
            let errors = product.validate();
            if !errors.is_empty() {
                return Err(Error::validation_rules("product", errors).source("storefront"));
            }
            next.catalog.update(product.clone());
        }
        Action::ApplyOffers(suggestions) => {
            next.catalog.apply_offer_suggestions(suggestions);
        }
        Action::AddReview { product_id, review } => {
            validate_review(review)?;
            next.catalog.add_review(product_id, review.clone());
        }
        Action::AddToCart {
            product_id,
            size,
            quantity,
        } => {
            // Stale product references no-op rather than fail
            if let Some(product) = next.catalog.get(product_id).cloned() {
                next.cart.add(&product, *size, *quantity)?;
            }
        }
        Action::RemoveFromCart { product_id, size } => {
            next.cart.remove(product_id, *size);
        }
        Action::UpdateCartQuantity {
            product_id,
            size,
            delta,
        } => {
            next.cart.update_quantity(product_id, *size, *delta);
        }
        Action::ClearCart => {
            next.cart.clear();
        }
        Action::Login { name, email, role } => {
            next.user = Some(session::login(name.clone(), email.clone(), *role));
        }
        Action::Register(request) => {
            next.user = Some(session::register(request, &policy.session)?);
        }
        Action::Logout => {
            next.user = None;
        }
    }

    Ok(next)
}

/// Event published after every successful state transition
#[derive(Debug, Clone)]
pub struct StoreEvent {
    topic: &'static str,
    source: String,
    metadata: Metadata,
    timestamp: DateTime<Utc>,
}

impl StoreEvent {
    fn new(action: &Action, state: &StorefrontState) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(
            "action".to_string(),
            serde_json::Value::String(action.name().to_string()),
        );
        metadata.insert(
            "product_count".to_string(),
            serde_json::Value::from(state.catalog.len()),
        );
        metadata.insert(
            "cart_items".to_string(),
            serde_json::Value::from(state.cart.item_count()),
        );
        metadata.insert(
            "authenticated".to_string(),
            serde_json::Value::from(state.user.is_some()),
        );

        Self {
            topic: action.topic(),
            source: "storefront_manager".to_string(),
            metadata,
            timestamp: Utc::now(),
        }
    }

    pub fn action(&self) -> Option<&str> {
        self.metadata.get("action").and_then(|v| v.as_str())
    }
}

impl Event for StoreEvent {
    fn event_type(&self) -> &'static str {
        self.topic
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

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn priority(&self) -> EventPriority {
        EventPriority::High
    }
}

/// Owns the storefront state and serializes all mutations through dispatch
pub struct StorefrontManager {
    state: ManagedState,
    store: Arc<RwLock<StorefrontState>>,
    policy: StorePolicy,
    event_bus: Option<Arc<EventBusManager>>,
}

impl std::fmt::Debug for StorefrontManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontManager")
            .field("policy", &self.policy)
            .finish()
    }
}

impl StorefrontManager {
    pub fn new(policy: StorePolicy) -> Self {
        Self {
            state: ManagedState::new(Uuid::new_v4(), "storefront_manager"),
            store: Arc::new(RwLock::new(StorefrontState::default())),
            policy,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBusManager>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Seeds the catalog; only an empty catalog accepts a seed. Returns the
    /// number of products loaded.
    pub async fn seed(&self, products: Vec<Product>) -> usize {
        let mut store = self.store.write().await;
        if !store.catalog.is_empty() {
            return 0;
        }
        let count = products.len();
        store.catalog = Catalog::with_products(products);
        count
    }

    /// Applies one action. The write lock is held across the transition so
    /// actions are strictly serialized, matching the one-mutator model.
    pub async fn dispatch(&self, action: Action) -> Result<()> {
        let event = {
            let mut store = self.store.write().await;
            let next = reduce(&store, &action, &self.policy)?;
            *store = next;
            StoreEvent::new(&action, &store)
        };

        if let Some(event_bus) = &self.event_bus {
            if let Err(e) = event_bus.publish(event).await {
                tracing::warn!(action = action.name(), "Failed to publish store event: {}", e);
            }
        }
        Ok(())
    }

    /// Returns a full copy of the current state
    pub async fn snapshot(&self) -> StorefrontState {
        self.store.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.store.read().await.user.clone()
    }

    pub async fn is_admin_session(&self) -> bool {
        self.store
            .read()
            .await
            .user
            .as_ref()
            .map(User::is_admin)
            .unwrap_or(false)
    }

    /// Derives totals for the current cart under the configured policy
    pub async fn cart_totals(&self) -> CartTotals {
        self.store.read().await.cart.totals(&self.policy.shipping)
    }

    /// Admin import affordance: acknowledges the payload without merging it
    pub async fn import_catalog(&self, records: &[Product]) -> ImportReport {
        self.store.read().await.catalog.import(records)
    }

    pub fn policy(&self) -> &StorePolicy {
        &self.policy
    }
}

#[async_trait::async_trait]
impl Manager for StorefrontManager {
    fn name(&self) -> &str {
        "storefront_manager"
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
        self.state.set_state(ManagerState::Shutdown).await;
        Ok(())
    }

    async fn status(&self) -> ManagerStatus {
        let mut status = self.state.status().await;
        let store = self.store.read().await;
        status.add_metadata("products", serde_json::Value::from(store.catalog.len()));
        status.add_metadata("cart_items", serde_json::Value::from(store.cart.item_count()));
        status.add_metadata(
            "authenticated",
            serde_json::Value::from(store.user.is_some()),
        );
        status
    }

    fn description(&self) -> Option<String> {
        Some("Owns catalog, cart, and session state for the storefront".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::demo_catalog;
    use crate::event::EventFilter;
    use futures::StreamExt;

    fn manager() -> StorefrontManager {
        StorefrontManager::new(StorePolicy::default())
    }

    async fn seeded() -> StorefrontManager {
        let manager = manager();
        manager.seed(demo_catalog()).await;
        manager
    }

    #[tokio::test]
    async fn test_add_to_cart_merges_quantities() {
        let manager = seeded().await;

        manager
            .dispatch(Action::AddToCart {
                product_id: "1".to_string(),
                size: 9.0,
                quantity: 1,
            })
            .await
            .unwrap();
        manager
            .dispatch(Action::AddToCart {
                product_id: "1".to_string(),
                size: 9.0,
                quantity: 2,
            })
            .await
            .unwrap();

        let state = manager.snapshot().await;
        assert_eq!(state.cart.len(), 1);
        assert_eq!(state.cart.items()[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_failed_action_leaves_state_unchanged() {
        let manager = seeded().await;
        let before = manager.snapshot().await;

        // Size 5 is not offered for product 1
        let err = manager
            .dispatch(Action::AddToCart {
                product_id: "1".to_string(),
                size: 5.0,
                quantity: 1,
            })
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(manager.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_add_to_cart_with_stale_reference_is_noop() {
        let manager = seeded().await;

        manager
            .dispatch(Action::AddToCart {
                product_id: "deleted-long-ago".to_string(),
                size: 9.0,
                quantity: 1,
            })
            .await
            .unwrap();
        assert!(manager.snapshot().await.cart.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_confirmation_clears_cart() {
        let manager = seeded().await;
        manager
            .dispatch(Action::AddToCart {
                product_id: "2".to_string(),
                size: 8.0,
                quantity: 2,
            })
            .await
            .unwrap();

        manager.dispatch(Action::ClearCart).await.unwrap();
        assert!(manager.snapshot().await.cart.is_empty());
    }

    #[tokio::test]
    async fn test_cart_totals_follow_policy() {
        let manager = seeded().await;
        manager
            .dispatch(Action::AddToCart {
                product_id: "4".to_string(), // 95.00
                size: 9.0,
                quantity: 1,
            })
            .await
            .unwrap();

        let totals = manager.cart_totals().await;
        assert_eq!(totals.subtotal, 95.0);
        assert_eq!(totals.shipping, 15.0);
        assert_eq!(totals.total, 110.0);
    }

    #[tokio::test]
    async fn test_offers_flow_through_reducer() {
        let manager = seeded().await;

        manager
            .dispatch(Action::ApplyOffers(vec![OfferSuggestion {
                product_id: "2".to_string(),
                suggested_price: 99.0,
                reasoning: "Midseason campaign".to_string(),
            }]))
            .await
            .unwrap();

        let state = manager.snapshot().await;
        let product = state.catalog.get("2").unwrap();
        assert_eq!(product.price, 99.0);
        assert_eq!(product.original_price, Some(120.0));
    }

    #[tokio::test]
    async fn test_review_validation_blocks_bad_input() {
        let manager = seeded().await;

        let err = manager
            .dispatch(Action::AddReview {
                product_id: "1".to_string(),
                review: Review {
                    id: "r1".to_string(),
                    user_name: String::new(),
                    rating: 9,
                    comment: String::new(),
                    date: "2026-08-06".to_string(),
                },
            })
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(manager.snapshot().await.catalog.get("1").unwrap().review_count, 124);
    }

    #[tokio::test]
    async fn test_session_transitions() {
        let manager = seeded().await;
        assert!(!manager.is_admin_session().await);

        manager
            .dispatch(Action::Login {
                name: "Demo User".to_string(),
                email: "demo@example.com".to_string(),
                role: UserRole::Admin,
            })
            .await
            .unwrap();
        assert!(manager.is_admin_session().await);

        manager.dispatch(Action::Logout).await.unwrap();
        assert!(manager.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_register_sets_standard_role() {
        let manager = seeded().await;

        manager
            .dispatch(Action::Register(RegistrationRequest {
                name: "New Customer".to_string(),
                email: "new@example.com".to_string(),
                password: "secret1".to_string(),
                confirm_password: "secret1".to_string(),
            }))
            .await
            .unwrap();

        let user = manager.current_user().await.unwrap();
        assert_eq!(user.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_import_acknowledges_without_merging() {
        let manager = seeded().await;

        let report = manager.import_catalog(&demo_catalog()).await;
        assert_eq!(report.received, 6);
        assert_eq!(report.merged, 0);
        assert_eq!(manager.snapshot().await.catalog.len(), 6);
    }

    #[tokio::test]
    async fn test_seed_only_fills_empty_catalog() {
        let manager = manager();
        assert_eq!(manager.seed(demo_catalog()).await, 6);
        assert_eq!(manager.seed(demo_catalog()).await, 0);
        assert_eq!(manager.snapshot().await.catalog.len(), 6);
    }

    #[tokio::test]
    async fn test_dispatch_publishes_events() {
        let event_bus = Arc::new(EventBusManager::new());
        let manager =
            StorefrontManager::new(StorePolicy::default()).with_event_bus(Arc::clone(&event_bus));
        manager.seed(demo_catalog()).await;

        let (_id, mut rx) = event_bus.subscribe(
            "test",
            EventFilter::new().with_event_type("storefront.cart.changed"),
        );

        manager
            .dispatch(Action::AddToCart {
                product_id: "1".to_string(),
                size: 9.0,
                quantity: 1,
            })
            .await
            .unwrap();

        let event = rx.next().await.unwrap();
        assert_eq!(event.event_type(), "storefront.cart.changed");
        let store_event = event.as_any().downcast_ref::<StoreEvent>().unwrap();
        assert_eq!(store_event.action(), Some("add_to_cart"));
    }

    #[test]
    fn test_reducer_is_pure() {
        let state = StorefrontState {
            catalog: Catalog::with_products(demo_catalog()),
            cart: Cart::new(),
            user: None,
        };
        let policy = StorePolicy::default();
        let action = Action::AddToCart {
            product_id: "1".to_string(),
            size: 9.0,
            quantity: 1,
        };

        let first = reduce(&state, &action, &policy).unwrap();
        let second = reduce(&state, &action, &policy).unwrap();
        assert_eq!(first, second);
        // The input state was not mutated
        assert!(state.cart.is_empty());
    }
}
