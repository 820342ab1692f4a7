pub mod config;
pub mod metrics;
pub mod server;
pub mod store;
pub mod template;
pub mod workflow;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    ConstraintViolation {
        constraint: String,
        field: Option<String>,
        message: String,
    },
    #[error("{0}")]
    Domain(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn constraint(
        constraint: impl Into<String>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Error::ConstraintViolation {
            constraint: constraint.into(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &str, id: i64) -> Self {
        Error::NotFound(format!("{} {} does not exist", kind, id))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
