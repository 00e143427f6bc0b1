// src/utils.rs

//! Utility functions and helpers shared across the storefront core.

pub use time::Time;

/// Time utilities
pub mod time {
    use chrono::{DateTime, Duration, Utc};

    /// Clock access for the storefront core
    pub struct Time;

    impl Time {
        /// Get current UTC time
        pub fn now() -> DateTime<Utc> {
            Utc::now()
        }

        /// Get current timestamp as milliseconds since epoch
        pub fn now_millis() -> u64 {
            Utc::now().timestamp_millis() as u64
        }

        /// Today's date formatted as YYYY-MM-DD, the shape review records carry
        pub fn today() -> String {
            Utc::now().format("%Y-%m-%d").to_string()
        }

        /// Create a DateTime from milliseconds since epoch
        pub fn from_millis(millis: i64) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(millis).unwrap_or_else(|| {
                DateTime::from_timestamp(1640995200, 0).unwrap_or_default() // Fallback
            })
        }

        /// Create a duration from seconds
        pub fn duration_secs(secs: i64) -> Duration {
            Duration::seconds(secs)
        }

        /// Create a duration from minutes
        pub fn duration_minutes(minutes: i64) -> Duration {
            Duration::minutes(minutes)
        }
    }
}

/// Validation utilities
pub mod validation {
    /// Email validation (basic)
    pub fn is_valid_email(email: &str) -> bool {
        email.contains('@') && email.contains('.') && email.len() > 5
    }

    /// URL validation (basic)
    pub fn is_valid_url(url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }

    /// Non-empty after trimming
    pub fn is_non_empty(value: &str) -> bool {
        !value.trim().is_empty()
    }

    /// Review ratings are whole stars, 1 through 5
    pub fn is_valid_rating(rating: u8) -> bool {
        (1..=5).contains(&rating)
    }

    /// Registration password validation, returns the violated rules
    pub fn validate_password(password: &str, confirm: &str, min_length: usize) -> Vec<String> {
        let mut errors = Vec::new();

        if password.len() < min_length {
            errors.push(format!("Password must be at least {} characters", min_length));
        }

        if password != confirm {
            errors.push("Passwords do not match".to_string());
        }

        errors
    }
}
