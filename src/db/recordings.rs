use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::error::AppError;
use crate::models::{Recording, RecordingMetadata, RecordingPatch, Tune};
use crate::ownership::{Owned, find_owned};
use crate::storage::BlobStore;
use crate::upload::AudioUpload;

macro_rules! recording_select {
    () => {
        "SELECT r.id, r.tune_id, r.filename, r.original_name, r.artist, r.key, r.description,
                r.duration, r.file_size, r.created_at
         FROM recordings r
         JOIN tunes t ON t.id = r.tune_id"
    };
}

impl Owned for Recording {
    const KIND: &'static str = "Recording";
    const OWNED_SQL: &'static str =
        concat!(recording_select!(), " WHERE r.id = ? AND t.user_id = ?");
}

/// Best-effort removal; failures are logged and otherwise ignored.
pub(crate) async fn remove_blobs(blobs: &dyn BlobStore, keys: &[String]) {
    for key in keys {
        if let Err(e) = blobs.delete(key).await {
            warn!(key = %key, error = %e, "Failed to remove blob");
        }
    }
}

#[instrument(skip(pool))]
pub async fn list_recordings(
    pool: &Pool<Sqlite>,
    user_id: i64,
    tune_id: i64,
) -> Result<Vec<Recording>, AppError> {
    info!("Listing recordings for tune");
    find_owned::<Tune, _>(pool, user_id, tune_id).await?;

    let recordings = sqlx::query_as::<_, Recording>(concat!(
        recording_select!(),
        " WHERE r.tune_id = ? ORDER BY r.created_at, r.id"
    ))
    .bind(tune_id)
    .fetch_all(pool)
    .await?;

    Ok(recordings)
}

#[instrument(skip(pool))]
pub async fn get_recording(
    pool: &Pool<Sqlite>,
    user_id: i64,
    recording_id: i64,
) -> Result<Recording, AppError> {
    info!("Fetching recording");
    find_owned::<Recording, _>(pool, user_id, recording_id).await
}

/// Stores the uploaded bytes and records them against an owned tune.
///
/// The upload is checked against the audio policy before anything is written.
/// If the row cannot be inserted the stored blob is removed again.
#[instrument(skip(pool, blobs, upload, metadata), fields(original_name = %upload.original_name, size = upload.bytes.len()))]
pub async fn create_recording(
    pool: &Pool<Sqlite>,
    blobs: &dyn BlobStore,
    user_id: i64,
    tune_id: i64,
    upload: &AudioUpload,
    metadata: RecordingMetadata,
) -> Result<Recording, AppError> {
    info!("Uploading recording");
    upload.check()?;
    find_owned::<Tune, _>(pool, user_id, tune_id).await?;

    let key = blobs.put(&upload.bytes, &upload.extension()).await?;

    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO recordings (tune_id, filename, original_name, artist, key, description, file_size)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(tune_id)
    .bind(&key)
    .bind(&upload.original_name)
    .bind(&metadata.artist)
    .bind(&metadata.key)
    .bind(&metadata.description)
    .bind(upload.size())
    .fetch_one(pool)
    .await;

    let recording_id = match inserted {
        Ok(id) => id,
        Err(e) => {
            remove_blobs(blobs, std::slice::from_ref(&key)).await;
            return Err(e.into());
        }
    };

    info!(recording_id, key = %key, "Recording stored");
    get_recording(pool, user_id, recording_id).await
}

#[instrument(skip(pool, patch))]
pub async fn update_recording(
    pool: &Pool<Sqlite>,
    user_id: i64,
    recording_id: i64,
    patch: RecordingPatch,
) -> Result<Recording, AppError> {
    info!("Updating recording");
    patch.validate()?;

    let mut tx = pool.begin().await?;
    let mut recording = find_owned::<Recording, _>(&mut *tx, user_id, recording_id).await?;
    patch.apply_to(&mut recording);

    sqlx::query(
        "UPDATE recordings SET artist = ?, key = ?, description = ?, duration = ? WHERE id = ?",
    )
    .bind(&recording.artist)
    .bind(&recording.key)
    .bind(&recording.description)
    .bind(recording.duration)
    .bind(recording.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(recording)
}

/// Removes the stored blob, then the row. Segments go with the row.
#[instrument(skip(pool, blobs))]
pub async fn delete_recording(
    pool: &Pool<Sqlite>,
    blobs: &dyn BlobStore,
    user_id: i64,
    recording_id: i64,
) -> Result<(), AppError> {
    info!("Deleting recording");
    let recording = find_owned::<Recording, _>(pool, user_id, recording_id).await?;

    remove_blobs(blobs, std::slice::from_ref(&recording.filename)).await;

    sqlx::query("DELETE FROM recordings WHERE id = ?")
        .bind(recording.id)
        .execute(pool)
        .await?;

    Ok(())
}
