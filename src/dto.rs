//! Request/response bodies of the authentication endpoints.
//!
//! Conventions:
//! - `*Request`  → deserialized from the client JSON body
//! - `*Response` → serialized to client JSON
//! - Validation is expressed via `validator` derive macros and runs in the
//!   `ValidatedJson` extractor, after serde has normalized the input.

use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

// ============================================================================
// Common
// ============================================================================

/// Standard success message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

fn trimmed_lowercase<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| s.trim().to_lowercase())
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    let allowed = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if (3..=32).contains(&len) && allowed {
        return Ok(());
    }
    let mut err = ValidationError::new("username");
    err.message = Some(
        "Username must be 3-32 characters of letters, digits, '_', '-' or '.'".into(),
    );
    Err(err)
}

// ============================================================================
// Auth
// ============================================================================

/// POST /api/register
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom = "validate_username")]
    pub username: String,

    #[serde(deserialize_with = "trimmed_lowercase")]
    #[validate(
        email(message = "Invalid email format"),
        length(max = 254, message = "Email too long")
    )]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[serde(default)]
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

/// POST /api/login
///
/// The identifier may arrive in either field and may be an e-mail address or
/// a username.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl LoginRequest {
    pub fn identifier(&self) -> Option<&str> {
        [self.email.as_deref(), self.username.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// POST /api/reset-password-request
#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[serde(deserialize_with = "trimmed_lowercase")]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// POST /api/reset-password
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}
