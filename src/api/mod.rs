use rocket::Route;
use rocket::serde::json::{Json, Value, json};

pub mod auth;
pub mod performances;
pub mod recordings;
pub mod segments;
pub mod sessions;
pub mod tunes;

#[get("/health")]
pub fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Every JSON endpoint, mounted under `/api`.
pub fn routes() -> Vec<Route> {
    routes![
        health,
        auth::api_register,
        auth::api_login,
        auth::api_me,
        tunes::api_list_tunes,
        tunes::api_create_tune,
        tunes::api_get_tune,
        tunes::api_update_tune,
        tunes::api_delete_tune,
        recordings::api_list_recordings,
        recordings::api_upload_recording,
        recordings::api_get_recording,
        recordings::api_update_recording,
        recordings::api_delete_recording,
        segments::api_list_segments,
        segments::api_create_segment,
        segments::api_get_segment,
        segments::api_update_segment,
        segments::api_delete_segment,
        sessions::api_list_sessions,
        sessions::api_create_session,
        sessions::api_get_session,
        sessions::api_update_session,
        sessions::api_delete_session,
        sessions::api_add_entry,
        sessions::api_update_entry,
        sessions::api_delete_entry,
        performances::api_list_performances,
        performances::api_create_performance,
        performances::api_get_performance,
        performances::api_update_performance,
        performances::api_delete_performance,
    ]
}
