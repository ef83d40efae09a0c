use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use validator::Validate;

use crate::error::AppError;
use crate::models::{NewSegment, Recording, Segment, SegmentPatch};
use crate::ownership::{Owned, find_owned};

macro_rules! segment_select {
    () => {
        "SELECT s.id, s.recording_id, s.label, s.start_time, s.end_time, s.color, s.notes,
                s.created_at
         FROM segments s
         JOIN recordings r ON r.id = s.recording_id
         JOIN tunes t ON t.id = r.tune_id"
    };
}

impl Owned for Segment {
    const KIND: &'static str = "Segment";
    const OWNED_SQL: &'static str =
        concat!(segment_select!(), " WHERE s.id = ? AND t.user_id = ?");
}

#[instrument(skip(pool))]
pub async fn list_segments(
    pool: &Pool<Sqlite>,
    user_id: i64,
    recording_id: i64,
) -> Result<Vec<Segment>, AppError> {
    info!("Listing segments for recording");
    find_owned::<Recording, _>(pool, user_id, recording_id).await?;

    let segments = sqlx::query_as::<_, Segment>(concat!(
        segment_select!(),
        " WHERE s.recording_id = ? ORDER BY s.start_time, s.id"
    ))
    .bind(recording_id)
    .fetch_all(pool)
    .await?;

    Ok(segments)
}

#[instrument(skip(pool))]
pub async fn get_segment(
    pool: &Pool<Sqlite>,
    user_id: i64,
    segment_id: i64,
) -> Result<Segment, AppError> {
    info!("Fetching segment");
    find_owned::<Segment, _>(pool, user_id, segment_id).await
}

#[instrument(skip(pool, segment), fields(label = %segment.label))]
pub async fn create_segment(
    pool: &Pool<Sqlite>,
    user_id: i64,
    recording_id: i64,
    segment: &NewSegment,
) -> Result<Segment, AppError> {
    info!("Creating segment");
    segment.validate()?;
    find_owned::<Recording, _>(pool, user_id, recording_id).await?;

    let segment_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO segments (recording_id, label, start_time, end_time, color, notes)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(recording_id)
    .bind(&segment.label)
    .bind(segment.start_time)
    .bind(segment.end_time)
    .bind(&segment.color)
    .bind(&segment.notes)
    .fetch_one(pool)
    .await?;

    get_segment(pool, user_id, segment_id).await
}

#[instrument(skip(pool, patch))]
pub async fn update_segment(
    pool: &Pool<Sqlite>,
    user_id: i64,
    segment_id: i64,
    patch: SegmentPatch,
) -> Result<Segment, AppError> {
    info!("Updating segment");
    patch.validate()?;

    let mut tx = pool.begin().await?;
    let mut segment = find_owned::<Segment, _>(&mut *tx, user_id, segment_id).await?;
    patch.apply_to(&mut segment)?;

    sqlx::query(
        "UPDATE segments
         SET label = ?, start_time = ?, end_time = ?, color = ?, notes = ?
         WHERE id = ?",
    )
    .bind(&segment.label)
    .bind(segment.start_time)
    .bind(segment.end_time)
    .bind(&segment.color)
    .bind(&segment.notes)
    .bind(segment.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(segment)
}

/// Practice entries that pointed at the segment keep existing with no segment.
#[instrument(skip(pool))]
pub async fn delete_segment(
    pool: &Pool<Sqlite>,
    user_id: i64,
    segment_id: i64,
) -> Result<(), AppError> {
    info!("Deleting segment");
    find_owned::<Segment, _>(pool, user_id, segment_id).await?;

    sqlx::query("DELETE FROM segments WHERE id = ?")
        .bind(segment_id)
        .execute(pool)
        .await?;

    Ok(())
}
