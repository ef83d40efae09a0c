use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::db::get_user;
use crate::error::AppError;
use crate::validation::{ToValidationResponse, ValidationResponse};

use super::{User, decode_token};

fn bearer_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

async fn authenticate(request: &Request<'_>) -> Outcome<User, ()> {
    let Some(token) = bearer_token(request) else {
        return Outcome::Error((Status::Unauthorized, ()));
    };

    let (Some(db), Some(config)) = (
        request.rocket().state::<SqlitePool>(),
        request.rocket().state::<AppConfig>(),
    ) else {
        tracing::error!("Database pool or configuration not found in managed state");
        return Outcome::Error((Status::InternalServerError, ()));
    };

    let user_id = match decode_token(token, &config.auth) {
        Ok(user_id) => user_id,
        Err(_) => return Outcome::Error((Status::Unauthorized, ())),
    };

    match get_user(db, user_id).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, "User authenticated via bearer token");
            Outcome::Success(user)
        }
        Err(AppError::NotFound(_)) => {
            tracing::warn!(user_id, "Token refers to a user that no longer exists");
            Outcome::Error((Status::Unauthorized, ()))
        }
        Err(err) => {
            tracing::error!(user_id, error = ?err, "Failed to fetch user for valid token");
            Outcome::Error((Status::InternalServerError, ()))
        }
    }
}

#[catch(default)]
pub fn default_api_catcher(status: Status, _req: &Request) -> Custom<Json<ValidationResponse>> {
    status.to_validation_response()
}
