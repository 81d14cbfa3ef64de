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
use crate::models::health_metric::{CreateHealthMetricRequest, HealthMetric};
use crate::AppState;

#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn list_health_metrics(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<Json<Vec<HealthMetric>>> {
    let metrics = sqlx::query_as::<_, HealthMetric>(
        r#"
        SELECT * FROM health_metrics
        WHERE user_id = $1
        ORDER BY date ASC, created_at ASC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(metrics))
}

#[instrument(skip_all, fields(user_id = %auth.user_id, metric_type = ?body.metric_type))]
pub async fn create_health_metric(
    State(state): State<AppState>,
    auth: AuthContext,
    ValidatedJson(body): ValidatedJson<CreateHealthMetricRequest>,
) -> AppResult<Json<HealthMetric>> {
    let metric = sqlx::query_as::<_, HealthMetric>(
        r#"
        INSERT INTO health_metrics (id, user_id, type, value, date, source)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth.user_id)
    .bind(body.metric_type)
    .bind(body.value)
    .bind(body.date)
    .bind(body.source_or_default())
    .fetch_one(&state.db)
    .await?;

    Ok(Json(metric))
}

#[instrument(skip_all, fields(user_id = %auth.user_id, metric_id = %metric_id))]
pub async fn delete_health_metric(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(metric_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    let result = sqlx::query("DELETE FROM health_metrics WHERE id = $1 AND user_id = $2")
        .bind(metric_id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Health metric not found".into()));
    }

    Ok(Json(MessageResponse::new("Health metric deleted")))
}
