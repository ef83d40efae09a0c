use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use validator::Validate;

use crate::error::AppError;
use crate::models::{NewPerformance, Performance, PerformancePatch};
use crate::ownership::{Owned, find_owned};

macro_rules! performance_select {
    () => {
        "SELECT id, user_id, title, date, time, venue, notes, created_at FROM performances"
    };
}

impl Owned for Performance {
    const KIND: &'static str = "Performance";
    const OWNED_SQL: &'static str =
        concat!(performance_select!(), " WHERE id = ? AND user_id = ?");
}

#[instrument(skip(pool))]
pub async fn list_performances(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<Performance>, AppError> {
    info!("Listing performances");
    Ok(sqlx::query_as::<_, Performance>(concat!(
        performance_select!(),
        " WHERE user_id = ? ORDER BY date DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

#[instrument(skip(pool))]
pub async fn get_performance(
    pool: &Pool<Sqlite>,
    user_id: i64,
    performance_id: i64,
) -> Result<Performance, AppError> {
    info!("Fetching performance");
    find_owned::<Performance, _>(pool, user_id, performance_id).await
}

#[instrument(skip(pool, performance), fields(title = %performance.title))]
pub async fn create_performance(
    pool: &Pool<Sqlite>,
    user_id: i64,
    performance: &NewPerformance,
) -> Result<Performance, AppError> {
    info!("Creating performance");
    performance.validate()?;

    Ok(sqlx::query_as::<_, Performance>(
        "INSERT INTO performances (user_id, title, date, time, venue, notes)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING id, user_id, title, date, time, venue, notes, created_at",
    )
    .bind(user_id)
    .bind(&performance.title)
    .bind(performance.date)
    .bind(&performance.time)
    .bind(&performance.venue)
    .bind(&performance.notes)
    .fetch_one(pool)
    .await?)
}

#[instrument(skip(pool, patch))]
pub async fn update_performance(
    pool: &Pool<Sqlite>,
    user_id: i64,
    performance_id: i64,
    patch: PerformancePatch,
) -> Result<Performance, AppError> {
    info!("Updating performance");
    patch.validate()?;

    let mut tx = pool.begin().await?;
    let mut performance = find_owned::<Performance, _>(&mut *tx, user_id, performance_id).await?;
    patch.apply_to(&mut performance);

    sqlx::query(
        "UPDATE performances SET title = ?, date = ?, time = ?, venue = ?, notes = ? WHERE id = ?",
    )
    .bind(&performance.title)
    .bind(performance.date)
    .bind(&performance.time)
    .bind(&performance.venue)
    .bind(&performance.notes)
    .bind(performance.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(performance)
}

#[instrument(skip(pool))]
pub async fn delete_performance(
    pool: &Pool<Sqlite>,
    user_id: i64,
    performance_id: i64,
) -> Result<(), AppError> {
    info!("Deleting performance");
    find_owned::<Performance, _>(pool, user_id, performance_id).await?;

    sqlx::query("DELETE FROM performances WHERE id = ?")
        .bind(performance_id)
        .execute(pool)
        .await?;

    Ok(())
}
