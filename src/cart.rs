// src/cart.rs - Shopping cart store

//! Session-scoped shopping cart. Line items are keyed by the pair
//! (product id, selected size): repeated adds for the same pair merge by
//! summing quantities, and no two entries with the same pair ever coexist.
//! Quantity updates clamp at 1 rather than removing the entry.

use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// A cart line item: a product snapshot plus the chosen size and quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub selected_size: f32,
    pub quantity: u32,
}

impl CartItem {
    fn matches(&self, product_id: &str, size: f32) -> bool {
        self.product.id == product_id && (self.selected_size - size).abs() < 0.001
    }
}

/// Derived order totals. Pure arithmetic over the current cart contents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
}

/// Shipping pricing applied when deriving totals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShippingPolicy {
    /// Subtotals strictly above this ship free
    pub free_shipping_threshold: f64,
    /// Flat fee below the threshold
    pub standard_fee: f64,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: 150.0,
            standard_fee: 15.0,
        }
    }
}

impl From<&StoreConfig> for ShippingPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            free_shipping_threshold: config.free_shipping_threshold,
            standard_fee: config.standard_shipping_fee,
        }
    }
}

/// Session-scoped shopping cart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct line items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Total units across all line items (the header badge count)
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Adds a product in the chosen size. The size must belong to the
    /// product's size set and the quantity must be at least 1; both are
    /// rejected with a validation error before any state changes. An
    /// existing entry for the same (id, size) pair absorbs the quantity;
    /// otherwise a new entry is appended, preserving insertion order.
    pub fn add(&mut self, product: &Product, size: f32, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(Error::validation("quantity", "Quantity must be at least 1"));
        }
        if !product.has_size(size) {
            return Err(Error::validation(
                "selected_size",
                format!("Size {} is not offered for '{}'", size, product.name),
            ));
        }

        match self
            .items
            .iter_mut()
            .find(|item| item.matches(&product.id, size))
        {
            Some(existing) => existing.quantity += quantity,
            None => self.items.push(CartItem {
                product: product.clone(),
                selected_size: size,
                quantity,
            }),
        }
        Ok(())
    }

    /// Removes the unique entry for (id, size); no-op when absent
    pub fn remove(&mut self, product_id: &str, size: f32) {
        self.items.retain(|item| !item.matches(product_id, size));
    }

    /// Adjusts an entry's quantity by a signed delta, clamping at 1. The
    /// entry is never removed this way, and a missing entry is a no-op.
    pub fn update_quantity(&mut self, product_id: &str, size: f32, delta: i64) {
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.matches(product_id, size))
        {
            let updated = (item.quantity as i64).saturating_add(delta).max(1);
            item.quantity = updated as u32;
        }
    }

    /// Derives subtotal, shipping, and total under the given policy
    pub fn totals(&self, policy: &ShippingPolicy) -> CartTotals {
        let subtotal: f64 = self
            .items
            .iter()
            .map(|item| item.product.price * item.quantity as f64)
            .sum();
        let shipping = if subtotal > policy.free_shipping_threshold {
            0.0
        } else {
            policy.standard_fee
        };
        CartTotals {
            subtotal,
            shipping,
            total: subtotal + shipping,
        }
    }

    /// Empties the cart; the post-checkout-confirmation transition
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
