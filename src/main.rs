#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod config;
mod db;
mod env;
mod error;
mod models;
mod ownership;
mod storage;
mod telemetry;
mod upload;
mod validation;
#[cfg(test)]
mod test;

use std::sync::Arc;

use auth::default_api_catcher;
use config::AppConfig;
use env::load_environment;
use rocket::data::{Limits, ToByteUnit};
use rocket::fs::{FileServer, Options};
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use storage::{LocalBlobStore, SharedBlobStore, UPLOADS_MOUNT};
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to load environment: {0}")]
    Env(#[from] dotenvy::Error),
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    load_environment()?;
    let config = AppConfig::from_env()?;
    let _otel_guard = init_tracing(&config.telemetry)?;

    info!(database = %config.database_url, "Connecting to database");
    let pool = SqlitePoolOptions::new()
        .connect(&config.database_url)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed successfully");

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let blobs: SharedBlobStore = Arc::new(LocalBlobStore::new(&config.upload_dir));

    build_rocket(pool, config, blobs).launch().await?;
    Ok(())
}

pub fn build_rocket(pool: SqlitePool, config: AppConfig, blobs: SharedBlobStore) -> Rocket<Build> {
    info!("Starting practice tracker");

    // Oversized uploads must reach the upload policy rather than fail inside form parsing.
    let limits = Limits::default().limit("data-form", 100.mebibytes());
    let figment = rocket::Config::figment().merge(("limits", limits));

    let uploads = FileServer::new(&config.upload_dir, Options::Missing);

    rocket::custom(figment)
        .manage(pool)
        .manage(config)
        .manage(blobs)
        .mount("/api", api::routes())
        .mount(UPLOADS_MOUNT, uploads)
        .register("/", catchers![default_api_catcher])
        .attach(TelemetryFairing)
}
