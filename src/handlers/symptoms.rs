use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::dto::MessageResponse;
use crate::error::{AppError, AppResult};
use crate::extract::ValidatedJson;
use crate::models::symptom::{CreateSymptomRequest, Symptom};
use crate::AppState;

#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn list_symptoms(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<Json<Vec<Symptom>>> {
    let symptoms = sqlx::query_as::<_, Symptom>(
        r#"
        SELECT * FROM symptoms
        WHERE user_id = $1
        ORDER BY date ASC, created_at ASC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(symptoms))
}

#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn create_symptom(
    State(state): State<AppState>,
    auth: AuthContext,
    ValidatedJson(body): ValidatedJson<CreateSymptomRequest>,
) -> AppResult<Json<Symptom>> {
    let symptom = sqlx::query_as::<_, Symptom>(
        r#"
        INSERT INTO symptoms (id, user_id, category, severity, description, date, mood, mood_intensity)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth.user_id)
    .bind(body.category.trim())
    .bind(body.severity)
    .bind(&body.description)
    .bind(body.date)
    .bind(body.mood.trim())
    .bind(body.mood_intensity)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(symptom))
}

#[instrument(skip_all, fields(user_id = %auth.user_id, symptom_id = %symptom_id))]
pub async fn delete_symptom(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(symptom_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let result = sqlx::query("DELETE FROM symptoms WHERE id = $1 AND user_id = $2")
        .bind(symptom_id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Symptom not found".into()));
    }

    Ok(Json(MessageResponse::new("Symptom deleted")))
}
