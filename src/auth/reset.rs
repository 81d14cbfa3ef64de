use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;

/// Hands a freshly issued password-reset token to the user, e.g. by e-mail.
#[async_trait]
pub trait ResetDelivery: Send + Sync {
    async fn deliver(&self, user_id: Uuid, email: &str, token: &str) -> AppResult<()>;
}

/// Development delivery: records that a token was issued without sending
/// anything. The token is never logged.
#[derive(Debug, Clone, Default)]
pub struct LogResetDelivery;

#[async_trait]
impl ResetDelivery for LogResetDelivery {
    async fn deliver(&self, user_id: Uuid, _email: &str, _token: &str) -> AppResult<()> {
        tracing::info!(user_id = %user_id, "Password reset token issued, no delivery configured");
        Ok(())
    }
}
