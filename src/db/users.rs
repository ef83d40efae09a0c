use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::{DbUser, User, hash_password, verify_password};
use crate::error::AppError;
use crate::models::NewUser;

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, password_hash, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn get_user_by_username(pool: &Pool<Sqlite>, username: &str) -> Result<User, AppError> {
    info!("Fetching user by username");
    find_db_user(pool, username)
        .await?
        .map(User::from)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", username)))
}

async fn find_db_user(pool: &Pool<Sqlite>, username: &str) -> Result<Option<DbUser>, AppError> {
    Ok(sqlx::query_as::<_, DbUser>(
        "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?)
}

#[instrument(skip(pool, user), fields(username = %user.username))]
pub async fn create_user(pool: &Pool<Sqlite>, user: &NewUser) -> Result<User, AppError> {
    info!("Registering user");
    user.validate()?;
    let password_hash = hash_password(&user.password)?;

    let row = sqlx::query_as::<_, DbUser>(
        "INSERT INTO users (username, password_hash)
         VALUES (?, ?)
         RETURNING id, username, password_hash, created_at",
    )
    .bind(&user.username)
    .bind(&password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "Username already registered"))?;

    info!(user_id = row.id, "User registered");
    Ok(User::from(row))
}

/// Checks a username/password pair. Unknown users and wrong passwords fail alike.
#[instrument(skip(pool, password))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    info!("Authenticating user");
    match find_db_user(pool, username).await? {
        Some(user) if verify_password(password, &user.password_hash) => Ok(User::from(user)),
        _ => {
            warn!("Login failed");
            Err(AppError::Authentication(
                "Invalid username or password".to_string(),
            ))
        }
    }
}
