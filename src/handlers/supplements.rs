use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::dto::MessageResponse;
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::extract::ValidatedJson;
use crate::models::supplement::{CreateSupplementRequest, Supplement};
use crate::AppState;

const DUPLICATE_NAME: &str = "Supplement with this name already exists";

#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn list_supplements(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<Json<Vec<Supplement>>> {
    let supplements = sqlx::query_as::<_, Supplement>(
        r#"
        SELECT * FROM supplements
        WHERE user_id = $1
        ORDER BY name ASC, created_at ASC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(supplements))
}

/// Names are unique per user, ignoring case. The owner's user row is locked
/// for the duration of the check and insert, so two concurrent requests for
/// the same user are serialized; the unique index catches anything else.
#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn create_supplement(
    State(state): State<AppState>,
    auth: AuthContext,
    ValidatedJson(body): ValidatedJson<CreateSupplementRequest>,
) -> AppResult<Json<Supplement>> {
    let name = body.name.trim();
    let mut tx = state.db.begin().await?;

    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(auth.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM supplements WHERE user_id = $1 AND lower(name) = lower($2))",
    )
    .bind(auth.user_id)
    .bind(name)
    .fetch_one(&mut *tx)
    .await?;

    if exists {
        return Err(AppError::Conflict(DUPLICATE_NAME.into()));
    }

    let supplement = sqlx::query_as::<_, Supplement>(
        r#"
        INSERT INTO supplements
            (id, user_id, name, dosage, frequency, reminder_enabled, reminder_time, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth.user_id)
    .bind(name)
    .bind(body.dosage.trim())
    .bind(body.frequency.trim())
    .bind(body.reminder_enabled)
    .bind(body.parsed_reminder_time())
    .bind(&body.notes)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "supplements_user_name_key") {
            AppError::Conflict(DUPLICATE_NAME.into())
        } else {
            AppError::Database(e)
        }
    })?;

    tx.commit().await?;

    Ok(Json(supplement))
}

#[instrument(skip_all, fields(user_id = %auth.user_id, supplement_id = %supplement_id))]
pub async fn delete_supplement(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(supplement_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let result = sqlx::query("DELETE FROM supplements WHERE id = $1 AND user_id = $2")
        .bind(supplement_id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Supplement not found".into()));
    }

    Ok(Json(MessageResponse::new("Supplement deleted")))
}

/// Record that a dose was taken now.
#[instrument(skip_all, fields(user_id = %auth.user_id, supplement_id = %supplement_id))]
pub async fn take_supplement(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(supplement_id): Path<Uuid>,
) -> AppResult<Json<Supplement>> {
    let supplement = sqlx::query_as::<_, Supplement>(
        r#"
        UPDATE supplements SET last_taken = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(supplement_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Supplement not found".into()))?;

    Ok(Json(supplement))
}
