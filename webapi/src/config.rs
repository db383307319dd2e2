use thiserror::Error;

pub const PORT_VAR: &str = "PORT";
pub const DATABASE_PATH_VAR: &str = "DATABASE_PATH";

const DEFAULT_PORT: u16 = 8080;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("DATABASE_PATH environment variable not set")]
    MissingDatabasePath,

    #[error("invalid PORT value: {0}")]
    InvalidPort(String),
}

/// Server configuration, read once at startup. The reporting configuration
/// is separate and owned by the reporting crate.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_path: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup(PORT_VAR).filter(|value| !value.is_empty()) {
            Some(raw) => {
                let parsed = raw.parse::<u16>().ok().filter(|port| *port != 0);
                parsed.ok_or(ConfigError::InvalidPort(raw))?
            }
            None => DEFAULT_PORT,
        };

        let database_path = lookup(DATABASE_PATH_VAR)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingDatabasePath)?;

        Ok(Self {
            host: "0.0.0.0".to_string(),
            port,
            database_path,
        })
    }
}
