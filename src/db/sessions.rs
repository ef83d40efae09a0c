use std::collections::HashMap;

use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};
use validator::Validate;

use crate::error::AppError;
use crate::models::{
    NewPracticeEntry, NewPracticeSession, PracticeEntry, PracticeEntryPatch, PracticeSession,
    PracticeSessionPatch, PracticeSessionWithEntries, Segment, Tune,
};
use crate::ownership::{Owned, find_owned};

macro_rules! session_select {
    () => {
        "SELECT id, user_id, date, duration_minutes, notes, created_at FROM practice_sessions"
    };
}

macro_rules! entry_select {
    () => {
        "SELECT e.id, e.session_id, e.tune_id, e.segment_id, e.focus, e.tempo_practiced,
                e.notes, e.rating, e.duration_minutes, e.created_at,
                COALESCE(t.title, '') AS tune_title
         FROM practice_entries e
         JOIN practice_sessions ps ON ps.id = e.session_id
         LEFT JOIN tunes t ON t.id = e.tune_id"
    };
}

impl Owned for PracticeSession {
    const KIND: &'static str = "Practice session";
    const OWNED_SQL: &'static str = concat!(session_select!(), " WHERE id = ? AND user_id = ?");
}

impl Owned for PracticeEntry {
    const KIND: &'static str = "Practice entry";
    const OWNED_SQL: &'static str =
        concat!(entry_select!(), " WHERE e.id = ? AND ps.user_id = ?");
}

/// An entry may only point at the user's own tune and segment.
async fn check_entry_references(
    conn: &mut SqliteConnection,
    user_id: i64,
    tune_id: Option<i64>,
    segment_id: Option<i64>,
) -> Result<(), AppError> {
    if let Some(tune_id) = tune_id {
        find_owned::<Tune, _>(&mut *conn, user_id, tune_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::Validation(format!("Tune {} not found", tune_id)),
                other => other,
            })?;
    }

    if let Some(segment_id) = segment_id {
        find_owned::<Segment, _>(&mut *conn, user_id, segment_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => {
                    AppError::Validation(format!("Segment {} not found", segment_id))
                }
                other => other,
            })?;
    }

    Ok(())
}

async fn insert_entry(
    conn: &mut SqliteConnection,
    session_id: i64,
    entry: &NewPracticeEntry,
) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "INSERT INTO practice_entries
            (session_id, tune_id, segment_id, focus, tempo_practiced, notes, rating, duration_minutes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(session_id)
    .bind(entry.tune_id)
    .bind(entry.segment_id)
    .bind(&entry.focus)
    .bind(entry.tempo_practiced)
    .bind(&entry.notes)
    .bind(entry.rating)
    .bind(entry.duration_minutes)
    .fetch_one(&mut *conn)
    .await?)
}

async fn entries_for_session(
    pool: &Pool<Sqlite>,
    session_id: i64,
) -> Result<Vec<PracticeEntry>, AppError> {
    Ok(sqlx::query_as::<_, PracticeEntry>(concat!(
        entry_select!(),
        " WHERE e.session_id = ? ORDER BY e.id"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?)
}

#[instrument(skip(pool))]
pub async fn list_sessions(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<PracticeSessionWithEntries>, AppError> {
    info!("Listing practice sessions");
    let sessions = sqlx::query_as::<_, PracticeSession>(concat!(
        session_select!(),
        " WHERE user_id = ? ORDER BY date DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let entries = sqlx::query_as::<_, PracticeEntry>(concat!(
        entry_select!(),
        " WHERE ps.user_id = ? ORDER BY e.id"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut by_session: HashMap<i64, Vec<PracticeEntry>> = HashMap::new();
    for entry in entries {
        by_session.entry(entry.session_id).or_default().push(entry);
    }

    Ok(sessions
        .into_iter()
        .map(|session| PracticeSessionWithEntries {
            entries: by_session.remove(&session.id).unwrap_or_default(),
            session,
        })
        .collect())
}

#[instrument(skip(pool))]
pub async fn get_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
) -> Result<PracticeSessionWithEntries, AppError> {
    info!("Fetching practice session");
    let session = find_owned::<PracticeSession, _>(pool, user_id, session_id).await?;
    let entries = entries_for_session(pool, session.id).await?;

    Ok(PracticeSessionWithEntries { session, entries })
}

/// Creates a session and all of its entries atomically.
///
/// Every referenced tune and segment is checked before anything is written, so a
/// single foreign reference leaves no session behind.
#[instrument(skip(pool, session), fields(date = %session.date, entries = session.entries.len()))]
pub async fn create_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session: &NewPracticeSession,
) -> Result<PracticeSessionWithEntries, AppError> {
    info!("Creating practice session");
    session.validate()?;

    let mut tx = pool.begin().await?;

    for entry in &session.entries {
        check_entry_references(&mut tx, user_id, Some(entry.tune_id), entry.segment_id).await?;
    }

    let session_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO practice_sessions (user_id, date, duration_minutes, notes)
         VALUES (?, ?, ?, ?)
         RETURNING id",
    )
    .bind(user_id)
    .bind(session.date)
    .bind(session.duration_minutes)
    .bind(&session.notes)
    .fetch_one(&mut *tx)
    .await?;

    for entry in &session.entries {
        insert_entry(&mut tx, session_id, entry).await?;
    }

    tx.commit().await?;

    info!(session_id, "Practice session created");
    get_session(pool, user_id, session_id).await
}

#[instrument(skip(pool, patch))]
pub async fn update_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
    patch: PracticeSessionPatch,
) -> Result<PracticeSessionWithEntries, AppError> {
    info!("Updating practice session");
    patch.validate()?;

    let mut tx = pool.begin().await?;
    let mut session = find_owned::<PracticeSession, _>(&mut *tx, user_id, session_id).await?;
    patch.apply_to(&mut session);

    sqlx::query(
        "UPDATE practice_sessions SET date = ?, duration_minutes = ?, notes = ? WHERE id = ?",
    )
    .bind(session.date)
    .bind(session.duration_minutes)
    .bind(&session.notes)
    .bind(session.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let entries = entries_for_session(pool, session.id).await?;
    Ok(PracticeSessionWithEntries { session, entries })
}

#[instrument(skip(pool))]
pub async fn delete_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
) -> Result<(), AppError> {
    info!("Deleting practice session");
    find_owned::<PracticeSession, _>(pool, user_id, session_id).await?;

    let result = sqlx::query("DELETE FROM practice_sessions WHERE id = ?")
        .bind(session_id)
        .execute(pool)
        .await?;

    info!(rows = result.rows_affected(), "Practice session deleted");
    Ok(())
}

#[instrument(skip(pool, entry), fields(tune_id = entry.tune_id))]
pub async fn add_entry(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
    entry: &NewPracticeEntry,
) -> Result<PracticeEntry, AppError> {
    info!("Adding practice entry");
    entry.validate()?;

    let mut tx = pool.begin().await?;
    find_owned::<PracticeSession, _>(&mut *tx, user_id, session_id).await?;
    check_entry_references(&mut tx, user_id, Some(entry.tune_id), entry.segment_id).await?;
    let entry_id = insert_entry(&mut tx, session_id, entry).await?;
    tx.commit().await?;

    find_owned::<PracticeEntry, _>(pool, user_id, entry_id).await
}

/// Re-pointing an entry at another tune or segment goes through the same ownership checks as
/// creating one.
#[instrument(skip(pool, patch))]
pub async fn update_entry(
    pool: &Pool<Sqlite>,
    user_id: i64,
    entry_id: i64,
    patch: PracticeEntryPatch,
) -> Result<PracticeEntry, AppError> {
    info!("Updating practice entry");
    patch.validate()?;

    let mut tx = pool.begin().await?;
    let mut entry = find_owned::<PracticeEntry, _>(&mut *tx, user_id, entry_id).await?;

    let new_tune = patch.tune_id.filter(|tune_id| *tune_id != entry.tune_id);
    let new_segment = patch
        .segment_id
        .flatten()
        .filter(|segment_id| Some(*segment_id) != entry.segment_id);

    patch.apply_to(&mut entry)?;

    if new_tune.is_some() || new_segment.is_some() {
        info!(?new_tune, ?new_segment, "Entry references changed");
        check_entry_references(&mut tx, user_id, new_tune, new_segment).await?;
    }

    sqlx::query(
        "UPDATE practice_entries
         SET tune_id = ?, segment_id = ?, focus = ?, tempo_practiced = ?, notes = ?,
             rating = ?, duration_minutes = ?
         WHERE id = ?",
    )
    .bind(entry.tune_id)
    .bind(entry.segment_id)
    .bind(&entry.focus)
    .bind(entry.tempo_practiced)
    .bind(&entry.notes)
    .bind(entry.rating)
    .bind(entry.duration_minutes)
    .bind(entry.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    find_owned::<PracticeEntry, _>(pool, user_id, entry_id).await
}

#[instrument(skip(pool))]
pub async fn delete_entry(
    pool: &Pool<Sqlite>,
    user_id: i64,
    entry_id: i64,
) -> Result<(), AppError> {
    info!("Deleting practice entry");
    find_owned::<PracticeEntry, _>(pool, user_id, entry_id).await?;

    sqlx::query("DELETE FROM practice_entries WHERE id = ?")
        .bind(entry_id)
        .execute(pool)
        .await?;

    Ok(())
}
