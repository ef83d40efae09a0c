use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::auth::User;
use crate::db::{create_tune, delete_tune, get_tune, list_tunes, update_tune};
use crate::models::{NewTune, Tune, TunePatch};
use crate::storage::SharedBlobStore;
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt};

#[get("/tunes?<status>")]
pub async fn api_list_tunes(
    status: Option<&str>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Tune>>> {
    let status = status.filter(|s| !s.is_empty());
    let tunes = list_tunes(db, user.id, status).await.validate_custom()?;
    Ok(Json(tunes))
}

#[post("/tunes", data = "<tune>")]
pub async fn api_create_tune(
    tune: Json<NewTune>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Tune>>> {
    let validated = tune.validate_custom()?;
    let created = create_tune(db, user.id, &validated).await.validate_custom()?;
    Ok(Custom(Status::Created, Json(created)))
}

#[get("/tunes/<id>")]
pub async fn api_get_tune(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<Tune>> {
    Ok(Json(get_tune(db, user.id, id).await.validate_custom()?))
}

#[patch("/tunes/<id>", data = "<patch>")]
pub async fn api_update_tune(
    id: i64,
    patch: Json<TunePatch>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Tune>> {
    let validated = patch.validate_custom()?;
    let tune = update_tune(db, user.id, id, validated)
        .await
        .validate_custom()?;
    Ok(Json(tune))
}

#[delete("/tunes/<id>")]
pub async fn api_delete_tune(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
    blobs: &State<SharedBlobStore>,
) -> ApiResult<Status> {
    delete_tune(db, blobs.inner().as_ref(), user.id, id)
        .await
        .validate_custom()?;
    Ok(Status::NoContent)
}
