pub mod auth;
pub mod health;
pub mod health_metrics;
pub mod supplements;
pub mod symptoms;
