use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::{
    password::{hash_password, verify_dummy, verify_password},
    token::{generate_token, hash_token},
    AuthContext,
};
use crate::dto::{
    LoginRequest, MessageResponse, PasswordResetRequest, RegisterRequest, ResetPasswordRequest,
};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::extract::ValidatedJson;
use crate::models::user::User;
use crate::AppState;

/// Resolve a login identifier to a user: e-mail first (case-insensitive),
/// then username.
async fn find_by_identifier(db: &PgPool, identifier: &str) -> AppResult<Option<User>> {
    let by_email = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(identifier.to_lowercase())
        .fetch_optional(db)
        .await?;
    if by_email.is_some() {
        return Ok(by_email);
    }

    let by_username = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(identifier)
        .fetch_optional(db)
        .await?;
    Ok(by_username)
}

/// Check credentials. Unknown identifiers and wrong passwords fail the same
/// way and cost the same hashing work.
pub async fn authenticate(db: &PgPool, identifier: &str, password: &str) -> AppResult<User> {
    let Some(user) = find_by_identifier(db, identifier).await? else {
        verify_dummy(password);
        return Err(AppError::InvalidCredentials);
    };

    if verify_password(password, &user.password_hash)? {
        Ok(user)
    } else {
        Err(AppError::InvalidCredentials)
    }
}

#[instrument(skip_all, fields(username = %body.username))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    let username_taken =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = $1")
            .bind(&body.username)
            .fetch_one(&state.db)
            .await?;
    if username_taken > 0 {
        return Err(AppError::BadRequest("Username already exists".into()));
    }

    let email_taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&body.email)
        .fetch_one(&state.db)
        .await?;
    if email_taken > 0 {
        return Err(AppError::BadRequest("Email already exists".into()));
    }

    let pwd_hash = hash_password(&body.password)?;
    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let user_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash, name)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(&body.username)
    .bind(&body.email)
    .bind(&pwd_hash)
    .bind(name)
    .execute(&state.db)
    .await
    .map_err(|e| {
        // Lost a race with a concurrent registration.
        if is_unique_violation(&e, "users_username_key") {
            AppError::BadRequest("Username already exists".into())
        } else if is_unique_violation(&e, "users_email_key") {
            AppError::BadRequest("Email already exists".into())
        } else {
            AppError::Database(e)
        }
    })?;

    let (_, cookie) = state.sessions.establish(user_id, &body.username).await?;
    tracing::info!(user_id = %user_id, "User registered");

    Ok((
        jar.add(cookie),
        Json(MessageResponse::new("Registration successful")),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    let identifier = body.identifier().ok_or_else(|| {
        AppError::BadRequest("Email or username is required".into())
    })?;

    let user = authenticate(&state.db, identifier, &body.password).await?;

    // Replace whatever session the browser was carrying.
    if let Some(old) = jar.get(state.sessions.cookie_name()) {
        state.sessions.destroy(old.value()).await?;
    }
    let (_, cookie) = state.sessions.establish(user.id, &user.username).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok((jar.add(cookie), Json(MessageResponse::new("Login successful"))))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    if let Some(cookie) = jar.get(state.sessions.cookie_name()) {
        state.sessions.destroy(cookie.value()).await?;
    }
    Ok((
        jar.add(state.sessions.removal_cookie()),
        Json(MessageResponse::new("Logout successful")),
    ))
}

#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> AppResult<Json<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(user))
}

#[instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<PasswordResetRequest>,
) -> AppResult<Json<MessageResponse>> {
    let user_id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
        .bind(&body.email)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let token = generate_token();
    let expires_at = Utc::now() + Duration::seconds(state.config.reset_token_ttl_secs);

    sqlx::query(
        r#"
        UPDATE users
        SET reset_token_hash = $2, reset_token_expires_at = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(hash_token(&token))
    .bind(expires_at)
    .execute(&state.db)
    .await?;

    state
        .reset_delivery
        .deliver(user_id, &body.email, &token)
        .await?;

    Ok(Json(MessageResponse::new("Password reset email sent")))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let pwd_hash = hash_password(&body.new_password)?;

    // Match, check expiry and consume the token in a single statement so a
    // token can only ever be used once.
    let user_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE users
        SET password_hash = $2,
            reset_token_hash = NULL,
            reset_token_expires_at = NULL,
            updated_at = NOW()
        WHERE reset_token_hash = $1 AND reset_token_expires_at > NOW()
        RETURNING id
        "#,
    )
    .bind(hash_token(&body.token))
    .bind(&pwd_hash)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".into()))?;

    let revoked = state.sessions.destroy_all_for_user(user_id).await?;
    tracing::info!(user_id = %user_id, sessions_revoked = revoked, "Password reset");

    Ok(Json(MessageResponse::new("Password reset successful")))
}
