use std::path::Path;

use rocket::State;
use rocket::data::{self, Data, FromData, ToByteUnit};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::Request;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{instrument, warn};

use crate::auth::User;
use crate::db::{
    create_recording, delete_recording, get_recording, list_recordings, update_recording,
};
use crate::error::AppError;
use crate::models::{Recording, RecordingMetadata, RecordingPatch};
use crate::storage::{BlobStore, SharedBlobStore};
use crate::upload::{AudioUpload, check_content_type, check_size};
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt};

const FALLBACK_ORIGINAL_NAME: &str = "recording";

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    #[serde(flatten)]
    pub recording: Recording,
    pub url: String,
}

impl RecordingResponse {
    fn new(recording: Recording, blobs: &dyn BlobStore) -> Self {
        let url = blobs.url_for(&recording.filename);
        Self { recording, url }
    }
}

/// Multipart upload body: a `file` part plus optional `artist`, `key` and
/// `description` text parts. Unknown parts are skipped.
pub struct RecordingUpload {
    audio: AudioUpload,
    metadata: RecordingMetadata,
}

#[rocket::async_trait]
impl<'r> FromData<'r> for RecordingUpload {
    type Error = AppError;

    async fn from_data(req: &'r Request<'_>, data: Data<'r>) -> data::Outcome<'r, Self> {
        match parse_upload(req, data).await {
            Ok(upload) => Outcome::Success(upload),
            Err(err) => Outcome::Error((err.status_code(), err)),
        }
    }
}

fn malformed(err: multer::Error) -> AppError {
    AppError::Validation(format!("Malformed multipart body: {}", err))
}

#[instrument(skip_all)]
async fn parse_upload(req: &Request<'_>, data: Data<'_>) -> Result<RecordingUpload, AppError> {
    let boundary = req
        .content_type()
        .filter(|ct| ct.is_form_data())
        .and_then(|ct| ct.param("boundary"))
        .ok_or_else(|| AppError::Validation("Expected a multipart/form-data body".to_string()))?;

    let limit = req
        .limits()
        .get("data-form")
        .unwrap_or_else(|| 100.mebibytes());
    let mut multipart = multer::Multipart::with_reader(data.open(limit), boundary);

    let mut audio = None;
    let mut metadata = RecordingMetadata::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => audio = Some(read_audio(field).await?),
            Some("artist") => metadata.artist = read_text(field).await?,
            Some("key") => metadata.key = read_text(field).await?,
            Some("description") => metadata.description = read_text(field).await?,
            other => warn!(field = ?other, "Skipping unexpected upload field"),
        }
    }

    let audio =
        audio.ok_or_else(|| AppError::Validation("A file part is required".to_string()))?;

    Ok(RecordingUpload { audio, metadata })
}

async fn read_text(field: multer::Field<'_>) -> Result<Option<String>, AppError> {
    let text = field.text().await.map_err(malformed)?;
    Ok(Some(text).filter(|value| !value.is_empty()))
}

/// Applies the media-type rule before reading and the size rule while reading.
/// The client's file name is kept whether or not the part declares a type.
async fn read_audio(mut field: multer::Field<'_>) -> Result<AudioUpload, AppError> {
    let content_type = field.content_type().map(|mime| mime.to_string());
    check_content_type(content_type.as_deref())?;

    let original_name = field
        .file_name()
        .and_then(|raw| Path::new(raw).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or(FALLBACK_ORIGINAL_NAME)
        .to_string();

    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        bytes.extend_from_slice(&chunk);
        check_size(bytes.len() as u64)?;
    }

    Ok(AudioUpload {
        original_name,
        content_type,
        bytes,
    })
}

#[get("/tunes/<tune_id>/recordings")]
pub async fn api_list_recordings(
    tune_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
    blobs: &State<SharedBlobStore>,
) -> ApiResult<Json<Vec<RecordingResponse>>> {
    let recordings = list_recordings(db, user.id, tune_id)
        .await
        .validate_custom()?;

    Ok(Json(
        recordings
            .into_iter()
            .map(|recording| RecordingResponse::new(recording, blobs.inner().as_ref()))
            .collect(),
    ))
}

#[post("/tunes/<tune_id>/recordings", data = "<upload>")]
pub async fn api_upload_recording(
    tune_id: i64,
    upload: Result<RecordingUpload, AppError>,
    user: User,
    db: &State<Pool<Sqlite>>,
    blobs: &State<SharedBlobStore>,
) -> ApiResult<Custom<Json<RecordingResponse>>> {
    let RecordingUpload { audio, metadata } = upload.validate_custom()?;

    let recording = create_recording(
        db,
        blobs.inner().as_ref(),
        user.id,
        tune_id,
        &audio,
        metadata,
    )
    .await
    .validate_custom()?;

    Ok(Custom(
        Status::Created,
        Json(RecordingResponse::new(recording, blobs.inner().as_ref())),
    ))
}

#[get("/recordings/<id>")]
pub async fn api_get_recording(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
    blobs: &State<SharedBlobStore>,
) -> ApiResult<Json<RecordingResponse>> {
    let recording = get_recording(db, user.id, id).await.validate_custom()?;
    Ok(Json(RecordingResponse::new(
        recording,
        blobs.inner().as_ref(),
    )))
}

#[patch("/recordings/<id>", data = "<patch>")]
pub async fn api_update_recording(
    id: i64,
    patch: Json<RecordingPatch>,
    user: User,
    db: &State<Pool<Sqlite>>,
    blobs: &State<SharedBlobStore>,
) -> ApiResult<Json<RecordingResponse>> {
    let validated = patch.validate_custom()?;
    let recording = update_recording(db, user.id, id, validated)
        .await
        .validate_custom()?;
    Ok(Json(RecordingResponse::new(
        recording,
        blobs.inner().as_ref(),
    )))
}

#[delete("/recordings/<id>")]
pub async fn api_delete_recording(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
    blobs: &State<SharedBlobStore>,
) -> ApiResult<Status> {
    delete_recording(db, blobs.inner().as_ref(), user.id, id)
        .await
        .validate_custom()?;
    Ok(Status::NoContent)
}
