//! Server-side sessions carried by a signed cookie.
//!
//! The cookie holds `"{token}.{signature}"`, where the signature is an
//! HMAC-SHA256 of the token under the configured session secret. The store
//! only ever sees `hash_token(token)`.
//!
//! Lifecycle: `establish` on login/register, `resolve` + `touch` on every
//! authenticated request (rolling TTL), `destroy` on logout. A record whose
//! `expires_at` has passed is deleted the first time it is looked up.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::auth::store::{SessionRecord, SessionStore};
use crate::auth::token::{generate_token, hash_token};
use crate::config::Config;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    secret: Arc<Vec<u8>>,
    ttl: Duration,
    cookie_name: String,
    secure: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: &Config) -> Self {
        Self {
            store,
            secret: Arc::new(config.session_secret.as_bytes().to_vec()),
            ttl: Duration::seconds(config.session_ttl_secs),
            cookie_name: config.session_cookie_name.clone(),
            secure: config.production,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Create and persist a new session. Returns the record and the cookie
    /// that carries it.
    pub async fn establish(
        &self,
        user_id: Uuid,
        username: &str,
    ) -> AppResult<(SessionRecord, Cookie<'static>)> {
        let token = generate_token();
        let record = SessionRecord {
            id: hash_token(&token),
            user_id,
            username: username.to_string(),
            expires_at: Utc::now() + self.ttl,
        };
        self.store.save(&record).await?;

        tracing::debug!(user_id = %user_id, "Session established");
        let cookie = self.session_cookie(self.sign(&token)?);
        Ok((record, cookie))
    }

    /// Look up the session behind a raw cookie value. Bad signatures, unknown
    /// ids and expired records all resolve to `None`.
    pub async fn resolve(&self, cookie_value: &str) -> AppResult<Option<SessionRecord>> {
        let Some(token) = self.unsign(cookie_value) else {
            tracing::debug!("Session cookie signature rejected");
            return Ok(None);
        };

        let id = hash_token(token);
        let Some(record) = self.store.load(&id).await? else {
            return Ok(None);
        };

        if record.is_expired(Utc::now()) {
            tracing::debug!(user_id = %record.user_id, "Session expired");
            self.store.delete(&id).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Rolling renewal: push the expiry a full TTL into the future. Returns
    /// false when the record was destroyed since it was resolved.
    pub async fn touch(&self, record: &mut SessionRecord) -> AppResult<bool> {
        let expires_at = Utc::now() + self.ttl;
        if !self.store.renew(&record.id, expires_at).await? {
            return Ok(false);
        }
        record.expires_at = expires_at;
        Ok(true)
    }

    /// Destroy the session behind a cookie value, if any. Idempotent.
    pub async fn destroy(&self, cookie_value: &str) -> AppResult<()> {
        if let Some(token) = self.unsign(cookie_value) {
            self.store.delete(&hash_token(token)).await?;
        }
        Ok(())
    }

    pub async fn destroy_record(&self, record: &SessionRecord) -> AppResult<()> {
        self.store.delete(&record.id).await
    }

    pub async fn destroy_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        self.store.delete_for_user(user_id).await
    }

    pub async fn prune_expired(&self) -> AppResult<u64> {
        self.store.delete_expired().await
    }

    /// Cookie carrying `value` with the session attributes and full TTL.
    pub fn session_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(self.ttl.num_seconds()))
            .build()
    }

    /// Cookie that clears the session cookie in the browser.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build();
        cookie.make_removal();
        cookie
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid session secret: {}", e)))
    }

    fn sign(&self, token: &str) -> AppResult<String> {
        let mut mac = self.mac()?;
        mac.update(token.as_bytes());
        Ok(format!("{}.{}", token, hex::encode(mac.finalize().into_bytes())))
    }

    fn unsign<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (token, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(token.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(token)
    }
}

/// Background task pruning expired sessions on a fixed interval.
pub fn spawn_session_pruner(sessions: SessionManager, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match sessions.prune_expired().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(purged = count, "Session pruning: removed expired sessions");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Session pruning failed");
                }
            }
        }
    });
}
