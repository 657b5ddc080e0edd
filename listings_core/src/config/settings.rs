use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub templates: TemplateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub migrate_on_start: bool,
    /// Refuse to start serving when the initial connection fails.
    pub require_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    pub max_age_days: i64,
    pub touch_after_seconds: i64,
    pub touch_cache_size: usize,
    pub secure_cookie: bool,
    pub prune_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub password_min_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory of `.html` templates overriding the built-in views.
    pub dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            session: SessionConfig::default(),
            auth: AuthConfig::default(),
            templates: TemplateConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public_dir: PathBuf::from("./public"),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_seconds: 30,
            migrate_on_start: true,
            require_on_start: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: "session".to_string(),
            max_age_days: 7,
            touch_after_seconds: 24 * 3600,
            touch_cache_size: 10_000,
            secure_cookie: false,
            prune_interval_seconds: 3600,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_min_length: 6,
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./templates"),
        }
    }
}

impl AppConfig {
    /// Layers defaults, an optional `config.toml`, `APP_*` variables and the
    /// well-known `DATABASE_URL` / `SESSION_SECRET` variables, then validates.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("session.secret", std::env::var("SESSION_SECRET").ok())?;

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Message(
                "Database URL must be set (DATABASE_URL)".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max connections must be greater than 0".to_string(),
            ));
        }

        if self.session.secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "Session secret must be set (SESSION_SECRET)".to_string(),
            ));
        }

        if self.session.secret.len() < 16 {
            tracing::warn!("Session secret is shorter than 16 bytes - use a longer secret in production!");
        }

        if self.session.cookie_name.is_empty() || self.session.cookie_name.contains(|c: char| c == ';' || c == '=' || c.is_whitespace()) {
            return Err(ConfigError::Message(format!(
                "Invalid session cookie name: {:?}",
                self.session.cookie_name
            )));
        }

        if self.session.max_age_days <= 0 {
            return Err(ConfigError::Message(
                "Session max age must be at least one day".to_string(),
            ));
        }

        if self.session.touch_after_seconds < 0 {
            return Err(ConfigError::Message(
                "Session touch interval cannot be negative".to_string(),
            ));
        }

        if self.auth.password_min_length == 0 {
            return Err(ConfigError::Message(
                "Password minimum length must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn session_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.session.max_age_days)
    }
}
