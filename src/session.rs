// src/session.rs - Mock session users and roles

//! Session identity for the storefront. There is no credential validation
//! anywhere in this module: the role is asserted directly at login and the
//! user exists only for the current session. Registration validates its
//! input before a user is created, and that is the extent of "auth" here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::types::Id;
use crate::utils::{validation, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

/// The session user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub logged_in_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Input to the registration flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationRequest {
    /// Validates the request without creating anything. All violated rules
    /// are reported together.
    pub fn validate(&self, config: &SessionConfig) -> Result<()> {
        let mut errors = Vec::new();

        if !validation::is_non_empty(&self.name)
            || !validation::is_non_empty(&self.email)
            || !validation::is_non_empty(&self.password)
        {
            errors.push("All fields are required".to_string());
        }

        if validation::is_non_empty(&self.email) && !validation::is_valid_email(&self.email) {
            errors.push("Email address is not valid".to_string());
        }

        if validation::is_non_empty(&self.password) {
            errors.extend(validation::validate_password(
                &self.password,
                &self.confirm_password,
                config.password_min_length,
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::validation_rules("registration", errors).source("session"))
        }
    }
}

/// Creates the session user with an asserted role. Mock only.
pub fn login(name: impl Into<String>, email: impl Into<String>, role: UserRole) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.into(),
        email: email.into(),
        role,
        logged_in_at: Time::now(),
    }
}

/// Validates a registration request and logs the new user in with the
/// standard role.
pub fn register(request: &RegistrationRequest, config: &SessionConfig) -> Result<User> {
    request.validate(config)?;
    Ok(login(request.name.clone(), request.email.clone(), UserRole::User))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegistrationRequest {
        RegistrationRequest {
            name: "Demo User".to_string(),
            email: "demo@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        }
    }

    #[test]
    fn test_login_asserts_role() {
        let user = login("Demo User", "demo@example.com", UserRole::Admin);
        assert!(user.is_admin());

        let user = login("Demo User", "demo@example.com", UserRole::User);
        assert!(!user.is_admin());
    }

    #[test]
    fn test_register_happy_path() {
        let user = register(&request(), &SessionConfig::default()).unwrap();
        assert_eq!(user.name, "Demo User");
        assert_eq!(user.role, UserRole::User);
    }

    #[test]
    fn test_register_rejects_missing_fields() {
        let mut bad = request();
        bad.name = String::new();

        let err = register(&bad, &SessionConfig::default()).unwrap_err();
        assert!(err.is_validation());
        assert!(err.message.contains("All fields are required"));
    }

    #[test]
    fn test_register_rejects_mismatched_passwords() {
        let mut bad = request();
        bad.confirm_password = "different".to_string();

        let err = register(&bad, &SessionConfig::default()).unwrap_err();
        assert!(err.message.contains("Passwords do not match"));
    }

    #[test]
    fn test_register_rejects_short_password() {
        let mut bad = request();
        bad.password = "abc".to_string();
        bad.confirm_password = "abc".to_string();

        let err = register(&bad, &SessionConfig::default()).unwrap_err();
        assert!(err.message.contains("at least 6 characters"));
    }

    #[test]
    fn test_register_rejects_bad_email() {
        let mut bad = request();
        bad.email = "not-an-email".to_string();

        let err = register(&bad, &SessionConfig::default()).unwrap_err();
        assert!(err.message.contains("Email address is not valid"));
    }

    #[test]
    fn test_role_serde_shape() {
        assert_eq!(serde_json::to_value(UserRole::Admin).unwrap(), "admin");
        assert_eq!(serde_json::to_value(UserRole::User).unwrap(), "user");
    }
}
