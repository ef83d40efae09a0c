//! Every record below a user is reachable only by the user at the end of its ownership chain.
//!
//! Each entity supplies a lookup that joins up to the owning user; a row that is missing
//! and a row that belongs to someone else produce the same [`AppError::NotFound`].

use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, FromRow, Sqlite};
use tracing::{instrument, warn};

use crate::error::AppError;

pub trait Owned: for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    /// Human readable name used in not-found messages.
    const KIND: &'static str;

    /// Selects one row, binding the entity id first and the owning user id second.
    const OWNED_SQL: &'static str;
}

#[instrument(skip(executor), fields(kind = T::KIND))]
pub async fn find_owned<'e, T, E>(executor: E, user_id: i64, id: i64) -> Result<T, AppError>
where
    T: Owned,
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, T>(T::OWNED_SQL)
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

    match row {
        Some(row) => Ok(row),
        None => {
            warn!("Entity absent or owned by another user");
            Err(AppError::NotFound(format!("{} {} not found", T::KIND, id)))
        }
    }
}
