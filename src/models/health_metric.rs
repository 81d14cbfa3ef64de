use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "metric_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    HeartRate,
    Sleep,
    Steps,
}

impl MetricType {
    /// Inclusive range of plausible values: bpm, hours, steps per entry.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            MetricType::HeartRate => (20.0, 250.0),
            MetricType::Sleep => (0.0, 24.0),
            MetricType::Steps => (0.0, 200_000.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetric {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub metric_type: MetricType,
    pub value: f64,
    pub date: DateTime<Utc>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// POST /api/health-metrics
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHealthMetricRequest {
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub value: f64,
    pub date: DateTime<Utc>,
    pub source: Option<String>,
}

impl CreateHealthMetricRequest {
    pub fn source_or_default(&self) -> &str {
        self.source.as_deref().unwrap_or("manual")
    }
}

// The allowed value range depends on the metric type, so this is written out
// instead of derived.
impl Validate for CreateHealthMetricRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let (min, max) = self.metric_type.bounds();
        if !self.value.is_finite() || self.value < min || self.value > max {
            let mut err = ValidationError::new("range");
            err.message = Some(format!("Value must be between {} and {}", min, max).into());
            errors.add("value", err);
        }

        if let Some(source) = &self.source {
            let len = source.chars().count();
            if len == 0 || len > 50 {
                let mut err = ValidationError::new("length");
                err.message = Some("Source must be 1-50 characters".into());
                errors.add("source", err);
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
