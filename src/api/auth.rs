use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{User, issue_token};
use crate::config::AppConfig;
use crate::db::{authenticate_user, create_user, get_user_by_username};
use crate::error::AppError;
use crate::models::NewUser;
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt, ToValidationResponse};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

#[post("/register", data = "<registration>")]
pub async fn api_register(
    registration: Json<NewUser>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<User>>> {
    let validated = registration.validate_custom()?;

    match get_user_by_username(db, &validated.username).await {
        Ok(_) => {
            return Err(
                AppError::Conflict("Username already registered".to_string())
                    .to_validation_response(),
            );
        }
        Err(AppError::NotFound(_)) => {}
        Err(e) => return Err(e.to_validation_response()),
    }

    let user = create_user(db, &validated)
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(user)))
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<Json<LoginResponse>> {
    let validated = login.validate_custom()?;

    let user = authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?;

    let access_token = issue_token(user.id, &config.auth).validate_custom()?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<User> {
    Json(user)
}
