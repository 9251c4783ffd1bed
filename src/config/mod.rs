use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub library: LibraryConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub default_per_page: u32,
    pub max_per_page: u32,
    pub max_uid_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            default_per_page: 100,
            max_per_page: 1000,
            max_uid_length: 40,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("LIBRARY_DEFAULT_PER_PAGE") {
            self.library.default_per_page = v.parse().unwrap_or(self.library.default_per_page);
        }
        if let Ok(v) = env::var("LIBRARY_MAX_PER_PAGE") {
            self.library.max_per_page = v.parse().unwrap_or(self.library.max_per_page);
        }

        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout_secs = v.parse().unwrap_or(self.database.connection_timeout_secs);
        }

        // A page can never be larger than the cap
        if self.library.default_per_page > self.library.max_per_page {
            self.library.default_per_page = self.library.max_per_page;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            library: LibraryConfig::default(),
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout_secs: 30,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            library: LibraryConfig {
                max_per_page: 500,
                ..LibraryConfig::default()
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout_secs: 10,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            library: LibraryConfig {
                max_per_page: 500,
                ..LibraryConfig::default()
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout_secs: 5,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.library.default_per_page, 100);
        assert_eq!(config.library.max_per_page, 1000);
        assert_eq!(config.library.max_uid_length, 40);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.library.max_per_page, 500);
        assert_eq!(config.database.max_connections, 50);
    }

    #[test]
    fn test_default_page_is_capped() {
        let mut config = AppConfig::development();
        config.library.default_per_page = 5000;
        let config = config.with_env_overrides();
        assert!(config.library.default_per_page <= config.library.max_per_page);
    }
}
