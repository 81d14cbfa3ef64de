use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Symptom {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: String,
    pub severity: i32,
    pub description: String,
    pub date: DateTime<Utc>,
    pub mood: String,
    pub mood_intensity: i32,
    pub created_at: DateTime<Utc>,
}

/// POST /api/symptoms
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSymptomRequest {
    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: String,

    #[validate(range(min = 1, max = 10, message = "Severity must be between 1 and 10"))]
    pub severity: i32,

    #[serde(default)]
    #[validate(length(max = 500, message = "Description is too long"))]
    pub description: String,

    pub date: DateTime<Utc>,

    #[validate(length(min = 1, max = 50, message = "Mood must be 1-50 characters"))]
    pub mood: String,

    #[validate(range(min = 1, max = 10, message = "Mood intensity must be between 1 and 10"))]
    pub mood_intensity: i32,
}
