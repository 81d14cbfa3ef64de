use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Identity of the caller, established by [`require_auth`]. Handlers take it
/// as an extractor argument and scope every query by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub username: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Rejects the request with 401 unless it carries a valid, unexpired session
/// whose user still exists. Renews the session and re-sets the cookie on the
/// way out.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(req.headers());
    let cookie_value = jar
        .get(state.sessions.cookie_name())
        .map(|c| c.value().to_string())
        .ok_or(AppError::Unauthorized)?;

    let mut session = state
        .sessions
        .resolve(&cookie_value)
        .await?
        .ok_or(AppError::Unauthorized)?;

    // The account may have been removed while the cookie was still live.
    let username = sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = $1")
        .bind(session.user_id)
        .fetch_optional(&state.db)
        .await?;

    let Some(username) = username else {
        tracing::warn!(user_id = %session.user_id, "Session refers to a missing user, destroying it");
        state.sessions.destroy_record(&session).await?;
        let jar = jar.add(state.sessions.removal_cookie());
        return Ok((jar, AppError::Unauthorized).into_response());
    };

    if !state.sessions.touch(&mut session).await? {
        // Logged out or revoked while this request was in flight.
        let jar = jar.add(state.sessions.removal_cookie());
        return Ok((jar, AppError::Unauthorized).into_response());
    }
    session.username = username;

    req.extensions_mut().insert(AuthContext {
        user_id: session.user_id,
        username: session.username,
    });

    let response = next.run(req).await;
    let jar = jar.add(state.sessions.session_cookie(cookie_value));
    Ok((jar, response).into_response())
}
