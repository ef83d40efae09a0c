use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

use crate::auth::AuthConfig;
use crate::env::is_production;

const DEFAULT_DATABASE_URL: &str = "sqlite://practice.db?mode=rwc";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_SECRET_KEY: &str = "dev_secret_key";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    pub otlp_api_key: Option<String>,
}

/// Process-wide settings, built once at startup and handed to Rocket as managed state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub auth: AuthConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            dotenvy::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let upload_dir = PathBuf::from(
            dotenvy::var("UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.to_string()),
        );

        let secret = match dotenvy::var("SECRET_KEY") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                if is_production() {
                    anyhow::bail!("SECRET_KEY must be set in production");
                }
                warn!("SECRET_KEY not set, using the development default");
                DEFAULT_SECRET_KEY.to_string()
            }
        };

        let token_ttl_hours = match dotenvy::var("TOKEN_TTL_HOURS") {
            Ok(value) => value
                .parse::<i64>()
                .with_context(|| format!("TOKEN_TTL_HOURS must be an integer, got {value:?}"))?,
            Err(_) => DEFAULT_TOKEN_TTL_HOURS,
        };

        if token_ttl_hours <= 0 {
            anyhow::bail!("TOKEN_TTL_HOURS must be positive, got {token_ttl_hours}");
        }

        Ok(Self {
            database_url,
            upload_dir,
            auth: AuthConfig {
                secret,
                token_ttl_hours,
            },
            telemetry: TelemetryConfig {
                otlp_endpoint: dotenvy::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
                otlp_api_key: dotenvy::var("OTEL_API_KEY").ok(),
            },
        })
    }
}
