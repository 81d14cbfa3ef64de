use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Supplement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub reminder_enabled: bool,
    pub reminder_time: Option<NaiveTime>,
    pub notes: Option<String>,
    pub last_taken: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// POST /api/supplements
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSupplementRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required (max 100 characters)"))]
    pub name: String,

    #[validate(length(min = 1, max = 100, message = "Dosage is required (max 100 characters)"))]
    pub dosage: String,

    #[validate(length(min = 1, max = 100, message = "Frequency is required (max 100 characters)"))]
    pub frequency: String,

    #[serde(default)]
    pub reminder_enabled: bool,

    /// "HH:MM" or "HH:MM:SS"; empty means no reminder time.
    #[validate(custom = "validate_reminder_time")]
    pub reminder_time: Option<String>,

    #[validate(length(max = 1000, message = "Notes are too long"))]
    pub notes: Option<String>,
}

impl CreateSupplementRequest {
    pub fn parsed_reminder_time(&self) -> Option<NaiveTime> {
        self.reminder_time.as_deref().and_then(parse_reminder_time)
    }
}

fn parse_reminder_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn validate_reminder_time(raw: &str) -> Result<(), ValidationError> {
    if raw.trim().is_empty() || parse_reminder_time(raw).is_some() {
        return Ok(());
    }
    let mut err = ValidationError::new("time");
    err.message = Some("Reminder time must be HH:MM".into());
    Err(err)
}
