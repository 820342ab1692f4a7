use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::store::{DatabaseConfig, DatabaseType, DEFAULT_SQLITE_PATH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or
    /// `product_workflow=debug,tower_http=info`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Build the configuration from the process environment, after loading
    /// a `.env` file if one exists.
    pub fn load() -> crate::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] but reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_type = match lookup("DATABASE_TYPE")
            .unwrap_or_else(|| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => DatabaseType::Sqlite,
            "postgres" | "postgresql" => DatabaseType::Postgres,
            other => {
                return Err(crate::Error::Config(format!(
                    "Unsupported DATABASE_TYPE: {}",
                    other
                )))
            }
        };

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value.parse().map_err(|_| {
                crate::Error::Config(format!("Invalid DATABASE_MAX_CONNECTIONS: {}", value))
            })?,
            None => 5,
        };

        let config = Config {
            server: ServerConfig {
                addr: lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            },
            database: DatabaseConfig {
                db_type,
                sqlite_path: Some(
                    lookup("SQLITE_PATH")
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH)),
                ),
                connection_string: lookup("DATABASE_URL"),
                max_connections,
            },
            logging: LoggingConfig {
                filter: lookup("RUST_LOG")
                    .or_else(|| lookup("LOG_LEVEL"))
                    .unwrap_or_else(|| "info".to_string()),
            },
        };

        config.database.validate().map_err(crate::Error::Config)?;

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
