use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use validator::Validate;

use super::recordings::remove_blobs;
use crate::error::AppError;
use crate::models::{NewTune, Tune, TunePatch};
use crate::ownership::{Owned, find_owned};
use crate::storage::BlobStore;

macro_rules! tune_select {
    () => {
        "SELECT t.id, t.user_id, t.title, t.composer, t.key, t.tempo, t.form, t.status,
                t.notes, t.created_at,
                (SELECT COUNT(*) FROM recordings r WHERE r.tune_id = t.id) AS recording_count
         FROM tunes t"
    };
}

impl Owned for Tune {
    const KIND: &'static str = "Tune";
    const OWNED_SQL: &'static str = concat!(tune_select!(), " WHERE t.id = ? AND t.user_id = ?");
}

#[instrument(skip(pool))]
pub async fn list_tunes(
    pool: &Pool<Sqlite>,
    user_id: i64,
    status: Option<&str>,
) -> Result<Vec<Tune>, AppError> {
    info!("Listing tunes");
    let tunes = sqlx::query_as::<_, Tune>(concat!(
        tune_select!(),
        " WHERE t.user_id = ? AND (? IS NULL OR t.status = ?)
          ORDER BY t.title, t.id"
    ))
    .bind(user_id)
    .bind(status)
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(tunes)
}

#[instrument(skip(pool))]
pub async fn get_tune(pool: &Pool<Sqlite>, user_id: i64, tune_id: i64) -> Result<Tune, AppError> {
    info!("Fetching tune");
    find_owned::<Tune, _>(pool, user_id, tune_id).await
}

#[instrument(skip(pool, tune), fields(title = %tune.title))]
pub async fn create_tune(
    pool: &Pool<Sqlite>,
    user_id: i64,
    tune: &NewTune,
) -> Result<Tune, AppError> {
    info!("Creating tune");
    tune.validate()?;

    let tune_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO tunes (user_id, title, composer, key, tempo, form, status, notes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(user_id)
    .bind(&tune.title)
    .bind(&tune.composer)
    .bind(&tune.key)
    .bind(tune.tempo)
    .bind(&tune.form)
    .bind(&tune.status)
    .bind(&tune.notes)
    .fetch_one(pool)
    .await?;

    get_tune(pool, user_id, tune_id).await
}

#[instrument(skip(pool, patch))]
pub async fn update_tune(
    pool: &Pool<Sqlite>,
    user_id: i64,
    tune_id: i64,
    patch: TunePatch,
) -> Result<Tune, AppError> {
    info!("Updating tune");
    patch.validate()?;

    let mut tx = pool.begin().await?;
    let mut tune = find_owned::<Tune, _>(&mut *tx, user_id, tune_id).await?;
    patch.apply_to(&mut tune);

    sqlx::query(
        "UPDATE tunes
         SET title = ?, composer = ?, key = ?, tempo = ?, form = ?, status = ?, notes = ?
         WHERE id = ?",
    )
    .bind(&tune.title)
    .bind(&tune.composer)
    .bind(&tune.key)
    .bind(tune.tempo)
    .bind(&tune.form)
    .bind(&tune.status)
    .bind(&tune.notes)
    .bind(tune.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(tune)
}

/// Deletes a tune together with its recordings and their segments.
///
/// Refused while any practice entry still refers to the tune. Blobs of the
/// removed recordings are cleaned up after the rows are gone.
#[instrument(skip(pool, blobs))]
pub async fn delete_tune(
    pool: &Pool<Sqlite>,
    blobs: &dyn BlobStore,
    user_id: i64,
    tune_id: i64,
) -> Result<(), AppError> {
    info!("Deleting tune");
    let mut tx = pool.begin().await?;
    find_owned::<Tune, _>(&mut *tx, user_id, tune_id).await?;

    let entry_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM practice_entries WHERE tune_id = ?")
            .bind(tune_id)
            .fetch_one(&mut *tx)
            .await?;

    if entry_count > 0 {
        return Err(AppError::Precondition(format!(
            "Tune {} has practice history and cannot be deleted",
            tune_id
        )));
    }

    let blob_keys =
        sqlx::query_scalar::<_, String>("SELECT filename FROM recordings WHERE tune_id = ?")
            .bind(tune_id)
            .fetch_all(&mut *tx)
            .await?;

    sqlx::query("DELETE FROM tunes WHERE id = ?")
        .bind(tune_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_foreign_key_violation(
                e,
                format!("Tune {} has practice history and cannot be deleted", tune_id),
            )
        })?;

    tx.commit().await?;

    info!(recordings = blob_keys.len(), "Tune deleted");
    remove_blobs(blobs, &blob_keys).await;
    Ok(())
}
