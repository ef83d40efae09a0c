use crate::error::AppError;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::instrument;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

pub type ApiResult<T> = Result<T, Custom<Json<ValidationResponse>>>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationResponse {
    pub fn new(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>>;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        self.log_and_record("API error");
        let status = self.status_code();

        let (field, message) = match &self {
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => {
                ("server", "Internal server error".to_string())
            }
            AppError::Authentication(msg) => ("authentication", msg.clone()),
            AppError::NotFound(msg) => ("resource", msg.clone()),
            AppError::Validation(msg) => ("request", msg.clone()),
            AppError::Conflict(msg) => ("resource", msg.clone()),
            AppError::Precondition(msg) => ("resource", msg.clone()),
            AppError::UnsupportedMediaType(msg) | AppError::PayloadTooLarge(msg) => {
                ("file", msg.clone())
            }
        };

        Custom(status, Json(ValidationResponse::with_error(field, &message)))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        let (field, message) = match self.code {
            400 => ("request", "Bad request"),
            401 => ("authentication", "Authentication required"),
            404 => ("resource", "Resource not found"),
            409 => ("resource", "Resource already exists"),
            413 => ("file", "Payload too large"),
            415 => ("file", "Unsupported media type"),
            422 => ("validation", "Validation failed"),
            500 => ("server", "Internal server error"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

#[derive(Debug)]
pub struct ValidationErrorWrapper(pub validator::ValidationErrors);

fn collect_errors(
    prefix: &str,
    errors: &ValidationErrors,
    out: &mut HashMap<String, Vec<String>>,
) {
    for (field, kind) in errors.errors() {
        let key = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                out.entry(key).or_default().extend(field_errors.iter().map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect_errors(&key, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_errors(&format!("{}[{}]", key, index), inner, out);
                }
            }
        }
    }
}

impl From<ValidationErrorWrapper> for Custom<Json<ValidationResponse>> {
    #[instrument]
    fn from(wrapper: ValidationErrorWrapper) -> Self {
        let mut error_map = HashMap::new();
        collect_errors("", &wrapper.0, &mut error_map);

        tracing::warn!(errors = ?error_map, "Request validation failed");

        Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::new(error_map)),
        )
    }
}

/// Runs `validator` rules on a JSON body, yielding the inner value.
pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> ApiResult<T>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> ApiResult<T> {
        let inner = self.into_inner();
        inner
            .validate()
            .map_err(|errors| Custom::from(ValidationErrorWrapper(errors)))?;
        Ok(inner)
    }
}

pub trait AppErrorExt<T> {
    fn validate_custom(self) -> ApiResult<T>;
}

impl<T> AppErrorExt<T> for Result<T, AppError> {
    fn validate_custom(self) -> ApiResult<T> {
        self.map_err(|err| err.to_validation_response())
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
/// in partial updates.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < 8 {
        return Err(ValidationError::new("password_too_short")
            .with_message("Password must be at least 8 characters".into()));
    }

    if password.len() > 72 {
        return Err(ValidationError::new("password_too_long")
            .with_message("Password must be 72 bytes or fewer".into()));
    }

    Ok(())
}

pub fn validate_time_range(start_time: f64, end_time: f64) -> Result<(), ValidationError> {
    if !start_time.is_finite() || !end_time.is_finite() || start_time < 0.0 {
        return Err(ValidationError::new("invalid_time")
            .with_message("Segment times must be non-negative numbers".into()));
    }

    if start_time >= end_time {
        return Err(ValidationError::new("invalid_time_range")
            .with_message("Segment start_time must be before end_time".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        notes: Option<Option<String>>,
    }

    #[test]
    fn test_double_option_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.notes, None);

        let null: Patch = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(null.notes, Some(None));

        let set: Patch = serde_json::from_str(r#"{"notes": "slow practice"}"#).unwrap();
        assert_eq!(set.notes, Some(Some("slow practice".to_string())));
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"a".repeat(72)).is_ok());
        assert!(validate_password(&"a".repeat(73)).is_err());
        // 8 characters but 24 bytes is fine, 25 four-byte characters is not
        assert!(validate_password("éééééééé").is_ok());
        assert!(validate_password(&"🎷".repeat(19)).is_err());
    }

    #[test]
    fn test_time_range_rules() {
        assert!(validate_time_range(0.0, 12.5).is_ok());
        assert!(validate_time_range(12.5, 12.5).is_err());
        assert!(validate_time_range(20.0, 10.0).is_err());
        assert!(validate_time_range(-1.0, 10.0).is_err());
        assert!(validate_time_range(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_status_bodies() {
        let unauthorized = Status::Unauthorized.to_validation_response();
        assert_eq!(unauthorized.0, Status::Unauthorized);
        assert_eq!(
            unauthorized.1.0.errors["authentication"],
            vec!["Authentication required".to_string()]
        );

        let unsupported = Status::UnsupportedMediaType.to_validation_response();
        assert_eq!(unsupported.1.0.errors["file"], vec!["Unsupported media type".to_string()]);

        let teapot = Status::ImATeapot.to_validation_response();
        assert_eq!(teapot.0, Status::ImATeapot);
        assert_eq!(teapot.1.0.status, "error");
        assert!(teapot.1.0.errors.contains_key("error"));
    }

    #[derive(Debug, validator::Validate)]
    struct Line {
        #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
        rating: i64,
    }

    #[derive(Debug, validator::Validate)]
    struct Sheet {
        #[validate(length(min = 1, message = "Title is required"))]
        title: String,
        #[validate(nested)]
        lines: Vec<Line>,
    }

    #[test]
    fn test_nested_errors_are_flattened() {
        let sheet = Sheet {
            title: String::new(),
            lines: vec![Line { rating: 3 }, Line { rating: 9 }],
        };
        let response = Custom::from(ValidationErrorWrapper(sheet.validate().unwrap_err()));

        assert_eq!(response.0, Status::UnprocessableEntity);
        let errors = &response.1.0.errors;
        assert_eq!(errors["title"], vec!["Title is required".to_string()]);
        assert_eq!(
            errors["lines[1].rating"],
            vec!["Rating must be between 1 and 5".to_string()]
        );
        assert!(!errors.contains_key("lines[0].rating"));
    }

    #[test]
    fn test_app_error_response_hides_internal_details() {
        let response = AppError::Internal("secret path".into()).to_validation_response();
        assert_eq!(response.0, Status::InternalServerError);
        let body = &response.1.0;
        assert_eq!(body.errors["server"], vec!["Internal server error".to_string()]);
    }
}
