use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::auth::User;
use crate::db::{
    add_entry, create_session, delete_entry, delete_session, get_session, list_sessions,
    update_entry, update_session,
};
use crate::models::{
    NewPracticeEntry, NewPracticeSession, PracticeEntry, PracticeEntryPatch,
    PracticeSessionPatch, PracticeSessionWithEntries,
};
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt};

#[get("/sessions")]
pub async fn api_list_sessions(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<PracticeSessionWithEntries>>> {
    Ok(Json(list_sessions(db, user.id).await.validate_custom()?))
}

#[post("/sessions", data = "<session>")]
pub async fn api_create_session(
    session: Json<NewPracticeSession>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<PracticeSessionWithEntries>>> {
    let validated = session.validate_custom()?;
    let created = create_session(db, user.id, &validated)
        .await
        .validate_custom()?;
    Ok(Custom(Status::Created, Json(created)))
}

#[get("/sessions/<id>")]
pub async fn api_get_session(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<PracticeSessionWithEntries>> {
    Ok(Json(get_session(db, user.id, id).await.validate_custom()?))
}

#[patch("/sessions/<id>", data = "<patch>")]
pub async fn api_update_session(
    id: i64,
    patch: Json<PracticeSessionPatch>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<PracticeSessionWithEntries>> {
    let validated = patch.validate_custom()?;
    let session = update_session(db, user.id, id, validated)
        .await
        .validate_custom()?;
    Ok(Json(session))
}

#[delete("/sessions/<id>")]
pub async fn api_delete_session(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    delete_session(db, user.id, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

#[post("/sessions/<session_id>/entries", data = "<entry>")]
pub async fn api_add_entry(
    session_id: i64,
    entry: Json<NewPracticeEntry>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<PracticeEntry>>> {
    let validated = entry.validate_custom()?;
    let created = add_entry(db, user.id, session_id, &validated)
        .await
        .validate_custom()?;
    Ok(Custom(Status::Created, Json(created)))
}

#[patch("/entries/<id>", data = "<patch>")]
pub async fn api_update_entry(
    id: i64,
    patch: Json<PracticeEntryPatch>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<PracticeEntry>> {
    let validated = patch.validate_custom()?;
    let entry = update_entry(db, user.id, id, validated)
        .await
        .validate_custom()?;
    Ok(Json(entry))
}

#[delete("/entries/<id>")]
pub async fn api_delete_entry(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    delete_entry(db, user.id, id).await.validate_custom()?;
    Ok(Status::NoContent)
}
