// src/catalog.rs - Product catalog store

//! The catalog holds the ordered list of sellable products for the current
//! session. All operations are synchronous, in-memory, and no-ops when they
//! reference an identifier that does not exist, so stale references from the
//! admin surface never fault. The single mutation path is the storefront
//! reducer in [`crate::store`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ProductId;
use crate::utils::Time;

/// Closed set of product categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductCategory {
    Running,
    Lifestyle,
    Basketball,
    Custom,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 4] = [
        Self::Running,
        Self::Lifestyle,
        Self::Basketball,
        Self::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Lifestyle => "Lifestyle",
            Self::Basketball => "Basketball",
            Self::Custom => "Custom",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A customer review. Immutable once appended to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub user_name: String,
    /// Whole stars, 1 through 5
    pub rating: u8,
    pub comment: String,
    /// YYYY-MM-DD
    pub date: String,
}

impl Review {
    /// Creates a review dated today with a fresh identifier
    pub fn new(user_name: impl Into<String>, rating: u8, comment: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_name: user_name.into(),
            rating,
            comment: comment.into(),
            date: Time::today(),
        }
    }
}

/// A sellable product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub price: f64,
    /// Pre-discount price; present only while a discount is active and never
    /// overwritten once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    pub description: String,
    /// Image URL or data URI
    pub image: String,
    pub sizes: Vec<f32>,
    pub category: ProductCategory,
    /// Average rating, 0 to 5
    pub rating: f32,
    /// Denormalized count; mirrors `reviews.len()` whenever the list is kept
    pub review_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
    /// Units sold, used only for display ranking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales: Option<u32>,
}

impl Product {
    pub fn is_on_sale(&self) -> bool {
        self.original_price.is_some()
    }

    /// Whether the given size is offered for this product
    pub fn has_size(&self, size: f32) -> bool {
        self.sizes.iter().any(|s| (*s - size).abs() < 0.001)
    }

    /// Checks the data-model invariants, returning the violated rules.
    /// Applied by the reducer before an admin add or update lands.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Product name is required".to_string());
        }
        if self.price < 0.0 {
            errors.push("Price must be non-negative".to_string());
        }
        if let Some(original) = self.original_price {
            if original < self.price {
                errors.push("Original price must not be below the current price".to_string());
            }
        }
        if self.sizes.is_empty() {
            errors.push("At least one size is required".to_string());
        }
        if self.sizes.iter().any(|s| *s <= 0.0) {
            errors.push("Sizes must be positive".to_string());
        }
        if !(0.0..=5.0).contains(&self.rating) {
            errors.push("Rating must be between 0 and 5".to_string());
        }

        errors
    }
}

/// An externally generated price proposal, applied only on explicit admin
/// confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSuggestion {
    pub product_id: ProductId,
    pub suggested_price: f64,
    pub reasoning: String,
}

/// Result of a catalog import. The import affordance acknowledges the payload
/// without merging it; `merged` stays zero until real merge semantics exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub received: usize,
    pub merged: usize,
}

/// Ordered, session-scoped product catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Appends a fully-formed product. Identifier uniqueness is the caller's
    /// responsibility; collisions are not detected.
    pub fn add(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Removes a product by identifier; no-op when absent
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.products.len();
        self.products.retain(|p| p.id != id);
        self.products.len() != before
    }

    /// Replaces the stored record matching the identifier wholesale; no
    /// partial-field merge. No-op when the identifier is unknown.
    pub fn update(&mut self, product: Product) -> bool {
        match self.products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => {
                *existing = product;
                true
            }
            None => false,
        }
    }

    /// Applies a batch of price suggestions. Unknown identifiers are silently
    /// skipped. The first application of a discount records the prior price
    /// as `original_price`; later applications never overwrite it. Returns
    /// the number of suggestions applied.
    pub fn apply_offer_suggestions(&mut self, suggestions: &[OfferSuggestion]) -> usize {
        let mut applied = 0;
        for suggestion in suggestions {
            let Some(product) = self
                .products
                .iter_mut()
                .find(|p| p.id == suggestion.product_id)
            else {
                continue;
            };

            if product.original_price.is_none() {
                product.original_price = Some(product.price);
            }
            product.price = suggestion.suggested_price;
            applied += 1;
        }
        applied
    }

    /// Appends a review to the product's list (creating the list when
    /// absent) and refreshes the denormalized count. No-op when the product
    /// is unknown. The review is expected to be pre-validated.
    pub fn add_review(&mut self, id: &str, review: Review) -> bool {
        let Some(product) = self.products.iter_mut().find(|p| p.id == id) else {
            return false;
        };

        let reviews = product.reviews.get_or_insert_with(Vec::new);
        reviews.push(review);
        product.review_count = reviews.len() as u32;
        true
    }

    /// Case-insensitive name search, the admin inventory filter
    pub fn search(&self, term: &str) -> Vec<&Product> {
        let needle = term.to_lowercase();
        self.products
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Leading slice for the landing view
    pub fn featured(&self, count: usize) -> &[Product] {
        &self.products[..count.min(self.products.len())]
    }

    /// Acknowledges an import payload without merging it (placeholder
    /// contract for the admin import affordance).
    pub fn import(&self, records: &[Product]) -> ImportReport {
        ImportReport {
            received: records.len(),
            merged: 0,
        }
    }
}

/// The built-in demo catalog the session starts with
pub fn demo_catalog() -> Vec<Product> {
    fn product(
        id: &str,
        name: &str,
        price: f64,
        original_price: Option<f64>,
        description: &str,
        image_seed: &str,
        sizes: &[f32],
        category: ProductCategory,
        rating: f32,
        review_count: u32,
    ) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            brand: "Soleworks".to_string(),
            price,
            original_price,
            description: description.to_string(),
            image: format!("https://picsum.photos/seed/{}/800/800", image_seed),
            sizes: sizes.to_vec(),
            category,
            rating,
            review_count,
            reviews: None,
            sales: None,
        }
    }

    vec![
        product(
            "1",
            "Velocity Runner X1",
            145.00,
            Some(180.00),
            "Engineered for speed, the Velocity Runner X1 features our proprietary foam technology for maximum energy return. The breathable mesh upper keeps you cool during intense runs.",
            "sneaker1",
            &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0],
            ProductCategory::Running,
            4.8,
            124,
        ),
        product(
            "2",
            "Street Legend High",
            120.00,
            None,
            "A modern take on a classic silhouette. The Street Legend High combines premium leather with urban aesthetics. Perfect for daily wear.",
            "sneaker2",
            &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0],
            ProductCategory::Lifestyle,
            4.5,
            89,
        ),
        product(
            "3",
            "Court Master Pro",
            160.00,
            None,
            "Dominate the court with superior grip and ankle support. The Court Master Pro is designed for explosive movements and hard landings.",
            "sneaker3",
            &[8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0],
            ProductCategory::Basketball,
            4.9,
            210,
        ),
        product(
            "4",
            "Urban Drift Low",
            95.00,
            Some(110.00),
            "Minimalist design meets maximum comfort. The Urban Drift Low is your go-to shoe for exploring the city.",
            "sneaker4",
            &[7.0, 8.0, 9.0, 10.0, 11.0],
            ProductCategory::Lifestyle,
            4.2,
            56,
        ),
        product(
            "5",
            "Marathon Elite",
            220.00,
            None,
            "For the serious long-distance runner. Carbon plate technology and ultra-lightweight materials.",
            "sneaker5",
            &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0],
            ProductCategory::Running,
            5.0,
            42,
        ),
        product(
            "6",
            "Dunk King Retro",
            135.00,
            None,
            "Throwback vibes with modern durability. The Dunk King Retro brings 90s style to today's streets.",
            "sneaker6",
            &[8.0, 9.0, 10.0, 11.0, 12.0],
            ProductCategory::Basketball,
            4.6,
            175,
        ),
    ]
}
