use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::auth::User;
use crate::db::{
    create_performance, delete_performance, get_performance, list_performances,
    update_performance,
};
use crate::models::{NewPerformance, Performance, PerformancePatch};
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt};

#[get("/performances")]
pub async fn api_list_performances(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Performance>>> {
    Ok(Json(list_performances(db, user.id).await.validate_custom()?))
}

#[post("/performances", data = "<performance>")]
pub async fn api_create_performance(
    performance: Json<NewPerformance>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Performance>>> {
    let validated = performance.validate_custom()?;
    let created = create_performance(db, user.id, &validated)
        .await
        .validate_custom()?;
    Ok(Custom(Status::Created, Json(created)))
}

#[get("/performances/<id>")]
pub async fn api_get_performance(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Performance>> {
    Ok(Json(get_performance(db, user.id, id).await.validate_custom()?))
}

#[patch("/performances/<id>", data = "<patch>")]
pub async fn api_update_performance(
    id: i64,
    patch: Json<PerformancePatch>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Performance>> {
    let validated = patch.validate_custom()?;
    let performance = update_performance(db, user.id, id, validated)
        .await
        .validate_custom()?;
    Ok(Json(performance))
}

#[delete("/performances/<id>")]
pub async fn api_delete_performance(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    delete_performance(db, user.id, id).await.validate_custom()?;
    Ok(Status::NoContent)
}
