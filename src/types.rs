use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for managers, events, sessions, etc.
pub type Id = Uuid;

/// Catalog product identifier. Generated by the caller and opaque to the
/// stores; uniqueness is not enforced here.
pub type ProductId = String;

/// Generic metadata container
pub type Metadata = HashMap<String, Value>;

/// Correlation ID for tracking related operations
pub type CorrelationId = Uuid;
