use std::fmt;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_SCRAPE_URL: &str = "https://gov.optimism.io";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key not found in environment variables (API_KEY)")]
    MissingApiKey,
    #[error("{field} is required for the {backend} backend")]
    MissingField {
        field: &'static str,
        backend: DbBackend,
    },
    #[error("unsupported DB_BACKEND {0:?} (expected \"mysql\" or \"sqlite\")")]
    UnknownBackend(String),
    #[error("failed to read environment: {0}")]
    Source(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
    MySql,
    Sqlite,
}

impl fmt::Display for DbBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbBackend::MySql => f.write_str("mysql"),
            DbBackend::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub database: String,
}

#[derive(Debug)]
pub enum DbSettings {
    MySql(MySqlSettings),
    Sqlite { path: PathBuf },
}

impl DbSettings {
    pub fn backend(&self) -> DbBackend {
        match self {
            DbSettings::MySql(_) => DbBackend::MySql,
            DbSettings::Sqlite { .. } => DbBackend::Sqlite,
        }
    }

    /// Connection string with the password masked, safe to log.
    pub fn redacted_url(&self) -> String {
        match self {
            DbSettings::MySql(m) => {
                let password = if m.password.expose_secret().is_empty() {
                    ""
                } else {
                    ":***"
                };
                format!(
                    "mysql://{}{}@{}:{}/{}",
                    m.user, password, m.host, m.port, m.database
                )
            }
            DbSettings::Sqlite { path } => format!("sqlite://{}", path.display()),
        }
    }
}

#[derive(Debug)]
pub struct Settings {
    pub api_key: SecretString,
    pub db: DbSettings,
    pub scrape_url: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub summarize_descriptions: bool,
}

// Every field is optional here so that validation can name exactly what is missing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    api_key: Option<SecretString>,
    db_backend: Option<String>,
    db_host: Option<String>,
    db_port: Option<u16>,
    db_user: Option<String>,
    db_password: Option<SecretString>,
    db_name: Option<String>,
    scrape_url: Option<String>,
    gemini_api_base: Option<String>,
    gemini_model: Option<String>,
    summarize_descriptions: Option<bool>,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    #[cfg(test)]
    fn from_source(vars: std::collections::HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_environment(config::Environment::default().source(Some(vars)))
    }

    fn from_environment(env: config::Environment) -> Result<Self, ConfigError> {
        let raw: RawSettings = config::Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()?;
        raw.validate()
    }
}

impl RawSettings {
    fn validate(self) -> Result<Settings, ConfigError> {
        let api_key = self
            .api_key
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let backend = match non_empty(self.db_backend).as_deref() {
            None => DbBackend::MySql,
            Some(b) if b.eq_ignore_ascii_case("mysql") => DbBackend::MySql,
            Some(b) if b.eq_ignore_ascii_case("sqlite") => DbBackend::Sqlite,
            Some(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let required = |value: Option<String>, field: &'static str| {
            non_empty(value).ok_or(ConfigError::MissingField { field, backend })
        };

        let db = match backend {
            DbBackend::MySql => DbSettings::MySql(MySqlSettings {
                host: required(self.db_host, "DB_HOST")?,
                port: self.db_port.unwrap_or(DEFAULT_MYSQL_PORT),
                user: required(self.db_user, "DB_USER")?,
                password: self
                    .db_password
                    .unwrap_or_else(|| SecretString::from(String::new())),
                database: required(self.db_name, "DB_NAME")?,
            }),
            DbBackend::Sqlite => DbSettings::Sqlite {
                path: PathBuf::from(required(self.db_name, "DB_NAME")?),
            },
        };

        Ok(Settings {
            api_key,
            db,
            scrape_url: non_empty(self.scrape_url).unwrap_or_else(|| DEFAULT_SCRAPE_URL.into()),
            gemini_api_base: non_empty(self.gemini_api_base)
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.into()),
            gemini_model: non_empty(self.gemini_model)
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
            summarize_descriptions: self.summarize_descriptions.unwrap_or(false),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
