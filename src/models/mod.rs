pub mod health_metric;
pub mod supplement;
pub mod symptom;
pub mod user;
