use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::error::AppError;

pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_EXTENSION: &str = ".mp3";

static ALLOWED_AUDIO_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "audio/mpeg",
        "audio/mp3",
        "audio/wav",
        "audio/x-wav",
        "audio/flac",
        "audio/ogg",
        "audio/aac",
        "audio/m4a",
        "audio/mp4",
    ])
});

/// An audio file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl AudioUpload {
    pub fn check(&self) -> Result<(), AppError> {
        check_upload(self.content_type.as_deref(), self.bytes.len() as u64)
    }

    pub fn extension(&self) -> String {
        extension_of(&self.original_name)
    }

    pub fn size(&self) -> i64 {
        self.bytes.len() as i64
    }
}

/// Undeclared types pass; declared ones must be on the audio allow-list.
pub fn check_content_type(content_type: Option<&str>) -> Result<(), AppError> {
    let Some(declared) = content_type else {
        return Ok(());
    };

    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if ALLOWED_AUDIO_TYPES.contains(essence.as_str()) {
        Ok(())
    } else {
        warn!(content_type = %declared, "Rejected upload media type");
        Err(AppError::UnsupportedMediaType(format!(
            "Unsupported file type: {}",
            declared
        )))
    }
}

pub fn check_size(size: u64) -> Result<(), AppError> {
    if size > MAX_UPLOAD_BYTES {
        warn!(size, "Rejected oversized upload");
        return Err(AppError::PayloadTooLarge(format!(
            "File too large: maximum size is {} MB",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

pub fn check_upload(content_type: Option<&str>, size: u64) -> Result<(), AppError> {
    check_content_type(content_type)?;
    check_size(size)
}

/// The client file's extension including the dot, or `.mp3` when it has no usable one.
pub fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
