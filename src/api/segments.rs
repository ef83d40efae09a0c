use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::auth::User;
use crate::db::{create_segment, delete_segment, get_segment, list_segments, update_segment};
use crate::models::{NewSegment, Segment, SegmentPatch};
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt};

#[get("/recordings/<recording_id>/segments")]
pub async fn api_list_segments(
    recording_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Segment>>> {
    let segments = list_segments(db, user.id, recording_id)
        .await
        .validate_custom()?;
    Ok(Json(segments))
}

#[post("/recordings/<recording_id>/segments", data = "<segment>")]
pub async fn api_create_segment(
    recording_id: i64,
    segment: Json<NewSegment>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Segment>>> {
    let validated = segment.validate_custom()?;
    let created = create_segment(db, user.id, recording_id, &validated)
        .await
        .validate_custom()?;
    Ok(Custom(Status::Created, Json(created)))
}

#[get("/segments/<id>")]
pub async fn api_get_segment(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Segment>> {
    Ok(Json(get_segment(db, user.id, id).await.validate_custom()?))
}

#[patch("/segments/<id>", data = "<patch>")]
pub async fn api_update_segment(
    id: i64,
    patch: Json<SegmentPatch>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Segment>> {
    let validated = patch.validate_custom()?;
    let segment = update_segment(db, user.id, id, validated)
        .await
        .validate_custom()?;
    Ok(Json(segment))
}

#[delete("/segments/<id>")]
pub async fn api_delete_segment(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    delete_segment(db, user.id, id).await.validate_custom()?;
    Ok(Status::NoContent)
}
