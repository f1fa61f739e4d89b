use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSWAP_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSWAP_CONFIG_DIR";

/// Signing secret used when running locally without one configured.
const LOCAL_TOKEN_SECRET: &str = "bookswap-local-development-secret";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            // Default to repo root `config` directory.
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_filename = format!("{}.toml", environment);
        let environment_path = config_dir.join(environment_filename);

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix("BOOKSWAP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        settings.auth.token_secret = settings.resolve_token_secret()?;

        Ok(settings)
    }

    /// The configured token secret, or the development secret when running
    /// locally. Other environments must configure one explicitly.
    fn resolve_token_secret(&self) -> anyhow::Result<Option<String>> {
        match (&self.auth.token_secret, &self.environment) {
            (Some(secret), _) if !secret.is_empty() => Ok(Some(secret.clone())),
            (_, Environment::Local) => Ok(Some(LOCAL_TOKEN_SECRET.to_string())),
            (_, env) => bail!("auth.token_secret must be set in the {:?} environment", env),
        }
    }

    /// Secret used to sign credential tokens.
    pub fn token_secret(&self) -> &str {
        self.auth
            .token_secret
            .as_deref()
            .unwrap_or(LOCAL_TOKEN_SECRET)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3030
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path; `:memory:` for a throwaway database.
    #[serde(default = "DatabaseSettings::default_path")]
    pub path: String,
}

impl DatabaseSettings {
    fn default_path() -> String {
        "bookswap.db".to_string()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub token_secret: Option<String>,
    #[serde(default = "AuthSettings::default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "AuthSettings::default_reset_ttl_secs")]
    pub reset_ttl_secs: u64,
}

impl AuthSettings {
    fn default_session_ttl_secs() -> u64 {
        7 * 24 * 60 * 60
    }

    fn default_reset_ttl_secs() -> u64 {
        60 * 60
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_secret: None,
            session_ttl_secs: Self::default_session_ttl_secs(),
            reset_ttl_secs: Self::default_reset_ttl_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_database_is_local_file() {
        let settings = Settings::default();
        assert_eq!(settings.database.path, "bookswap.db");
    }

    #[test]
    fn sessions_last_a_week() {
        let settings = Settings::default();
        assert_eq!(settings.auth.session_ttl_secs, 604_800);
    }

    #[test]
    fn local_falls_back_to_development_secret() {
        let settings = Settings::default();
        assert_eq!(
            settings.resolve_token_secret().unwrap().as_deref(),
            Some(LOCAL_TOKEN_SECRET)
        );
    }

    #[test]
    fn production_requires_a_secret() {
        let mut settings = Settings {
            environment: Environment::Production,
            ..Settings::default()
        };
        assert!(settings.resolve_token_secret().is_err());

        settings.auth.token_secret = Some("s3cret".to_string());
        assert_eq!(
            settings.resolve_token_secret().unwrap().as_deref(),
            Some("s3cret")
        );
    }
}
