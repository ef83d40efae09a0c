use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::validation::{double_option, validate_password, validate_time_range};

pub const DEFAULT_TUNE_STATUS: &str = "learning";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tune {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub composer: Option<String>,
    pub key: Option<String>,
    pub tempo: Option<i64>,
    pub form: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub recording_count: i64, // Computed at read time
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Recording {
    pub id: i64,
    pub tune_id: i64,
    pub filename: String,
    pub original_name: String,
    pub artist: Option<String>,
    pub key: Option<String>,
    pub description: Option<String>,
    pub duration: Option<f64>,
    pub file_size: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Segment {
    pub id: i64,
    pub recording_id: i64,
    pub label: String,
    pub start_time: f64,
    pub end_time: f64,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PracticeSession {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PracticeEntry {
    pub id: i64,
    pub session_id: i64,
    pub tune_id: i64,
    pub segment_id: Option<i64>,
    pub focus: Option<String>,
    pub tempo_practiced: Option<i64>,
    pub notes: Option<String>,
    pub rating: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub created_at: NaiveDateTime,
    pub tune_title: String, // Joined from tunes, empty when the tune is missing
}

#[derive(Debug, Clone, Serialize)]
pub struct PracticeSessionWithEntries {
    #[serde(flatten)]
    pub session: PracticeSession,
    pub entries: Vec<PracticeEntry>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Performance {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

// Creation inputs

/// Registration input. Not `Debug`, it carries the plain-text password.
#[derive(Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

#[cfg(test)]
impl NewUser {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

fn default_status() -> String {
    DEFAULT_TUNE_STATUS.to_string()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTune {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub composer: Option<String>,
    pub key: Option<String>,
    pub tempo: Option<i64>,
    pub form: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    pub notes: Option<String>,
}

#[cfg(test)]
impl NewTune {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            composer: None,
            key: None,
            tempo: None,
            form: None,
            status: default_status(),
            notes: None,
        }
    }
}

/// Descriptive metadata sent alongside an uploaded file.
#[derive(Debug, Clone, Default)]
pub struct RecordingMetadata {
    pub artist: Option<String>,
    pub key: Option<String>,
    pub description: Option<String>,
}

fn validate_new_segment_times(segment: &NewSegment) -> Result<(), ValidationError> {
    validate_time_range(segment.start_time, segment.end_time)
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_new_segment_times"))]
pub struct NewSegment {
    #[validate(length(min = 1, message = "Label is required"))]
    pub label: String,
    pub start_time: f64,
    pub end_time: f64,
    pub color: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPracticeEntry {
    pub tune_id: i64,
    pub segment_id: Option<i64>,
    pub focus: Option<String>,
    pub tempo_practiced: Option<i64>,
    pub notes: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i64>,
    pub duration_minutes: Option<i64>,
}

#[cfg(test)]
impl NewPracticeEntry {
    pub fn for_tune(tune_id: i64) -> Self {
        Self {
            tune_id,
            segment_id: None,
            focus: None,
            tempo_practiced: None,
            notes: None,
            rating: None,
            duration_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPracticeSession {
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub entries: Vec<NewPracticeEntry>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPerformance {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub notes: Option<String>,
}

// Partial updates. An absent field is left untouched; `null` clears a nullable field.

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TunePatch {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub composer: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub key: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub tempo: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub form: Option<Option<String>>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl TunePatch {
    pub fn apply_to(self, tune: &mut Tune) {
        if let Some(title) = self.title {
            tune.title = title;
        }
        if let Some(composer) = self.composer {
            tune.composer = composer;
        }
        if let Some(key) = self.key {
            tune.key = key;
        }
        if let Some(tempo) = self.tempo {
            tune.tempo = tempo;
        }
        if let Some(form) = self.form {
            tune.form = form;
        }
        if let Some(status) = self.status {
            tune.status = status;
        }
        if let Some(notes) = self.notes {
            tune.notes = notes;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RecordingPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub artist: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub key: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub duration: Option<Option<f64>>,
}

impl RecordingPatch {
    pub fn apply_to(self, recording: &mut Recording) {
        if let Some(artist) = self.artist {
            recording.artist = artist;
        }
        if let Some(key) = self.key {
            recording.key = key;
        }
        if let Some(description) = self.description {
            recording.description = description;
        }
        if let Some(duration) = self.duration {
            recording.duration = duration;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SegmentPatch {
    #[validate(length(min = 1, message = "Label cannot be empty"))]
    pub label: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl SegmentPatch {
    /// The merged times still have to satisfy the time range rule.
    pub fn apply_to(self, segment: &mut Segment) -> Result<(), ValidationError> {
        if let Some(label) = self.label {
            segment.label = label;
        }
        if let Some(start_time) = self.start_time {
            segment.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            segment.end_time = end_time;
        }
        if let Some(color) = self.color {
            segment.color = color;
        }
        if let Some(notes) = self.notes {
            segment.notes = notes;
        }

        validate_time_range(segment.start_time, segment.end_time)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PracticeSessionPatch {
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub duration_minutes: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl PracticeSessionPatch {
    pub fn apply_to(self, session: &mut PracticeSession) {
        if let Some(date) = self.date {
            session.date = date;
        }
        if let Some(duration_minutes) = self.duration_minutes {
            session.duration_minutes = duration_minutes;
        }
        if let Some(notes) = self.notes {
            session.notes = notes;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PracticeEntryPatch {
    pub tune_id: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub segment_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub focus: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub tempo_practiced: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub rating: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub duration_minutes: Option<Option<i64>>,
}

impl PracticeEntryPatch {
    pub fn apply_to(self, entry: &mut PracticeEntry) -> Result<(), ValidationError> {
        if let Some(tune_id) = self.tune_id {
            entry.tune_id = tune_id;
        }
        if let Some(segment_id) = self.segment_id {
            entry.segment_id = segment_id;
        }
        if let Some(focus) = self.focus {
            entry.focus = focus;
        }
        if let Some(tempo_practiced) = self.tempo_practiced {
            entry.tempo_practiced = tempo_practiced;
        }
        if let Some(notes) = self.notes {
            entry.notes = notes;
        }
        if let Some(rating) = self.rating {
            entry.rating = rating;
        }
        if let Some(duration_minutes) = self.duration_minutes {
            entry.duration_minutes = duration_minutes;
        }

        match entry.rating {
            Some(rating) if !(1..=5).contains(&rating) => Err(ValidationError::new("range")
                .with_message("Rating must be between 1 and 5".into())),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PerformancePatch {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub time: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub venue: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl PerformancePatch {
    pub fn apply_to(self, performance: &mut Performance) {
        if let Some(title) = self.title {
            performance.title = title;
        }
        if let Some(date) = self.date {
            performance.date = date;
        }
        if let Some(time) = self.time {
            performance.time = time;
        }
        if let Some(venue) = self.venue {
            performance.venue = venue;
        }
        if let Some(notes) = self.notes {
            performance.notes = notes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tune() -> Tune {
        Tune {
            id: 1,
            user_id: 1,
            title: "Autumn Leaves".to_string(),
            composer: Some("Joseph Kosma".to_string()),
            key: Some("Gm".to_string()),
            tempo: Some(120),
            form: Some("AABC".to_string()),
            status: "learning".to_string(),
            notes: Some("Watch the bridge".to_string()),
            created_at: NaiveDateTime::default(),
            recording_count: 0,
        }
    }

    #[test]
    fn test_tune_patch_only_touches_supplied_fields() {
        let mut tune = sample_tune();
        let patch: TunePatch = serde_json::from_str(r#"{"status": "mastered"}"#).unwrap();
        patch.apply_to(&mut tune);

        assert_eq!(tune.status, "mastered");
        assert_eq!(tune.title, "Autumn Leaves");
        assert_eq!(tune.composer.as_deref(), Some("Joseph Kosma"));
        assert_eq!(tune.tempo, Some(120));
    }

    #[test]
    fn test_tune_patch_null_clears_nullable_field() {
        let mut tune = sample_tune();
        let patch: TunePatch =
            serde_json::from_str(r#"{"composer": null, "title": null}"#).unwrap();
        patch.apply_to(&mut tune);

        assert_eq!(tune.composer, None);
        assert_eq!(tune.title, "Autumn Leaves");
    }

    #[test]
    fn test_new_tune_defaults_status() {
        let tune: NewTune = serde_json::from_str(r#"{"title": "Blue Bossa"}"#).unwrap();
        assert_eq!(tune.status, DEFAULT_TUNE_STATUS);
        assert!(tune.validate().is_ok());

        let empty: NewTune = serde_json::from_str(r#"{"title": ""}"#).unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_new_segment_requires_ordered_times() {
        let segment: NewSegment =
            serde_json::from_str(r#"{"label": "Head", "start_time": 30.0, "end_time": 10.0}"#)
                .unwrap();
        assert!(segment.validate().is_err());

        let segment: NewSegment =
            serde_json::from_str(r#"{"label": "Head", "start_time": 0.0, "end_time": 32.5}"#)
                .unwrap();
        assert!(segment.validate().is_ok());
    }

    #[test]
    fn test_segment_patch_validates_merged_times() {
        let mut segment = Segment {
            id: 1,
            recording_id: 1,
            label: "Solo".to_string(),
            start_time: 10.0,
            end_time: 20.0,
            color: None,
            notes: None,
            created_at: NaiveDateTime::default(),
        };

        let patch = SegmentPatch {
            start_time: Some(25.0),
            ..Default::default()
        };
        assert!(patch.apply_to(&mut segment).is_err());
    }

    #[test]
    fn test_session_entry_ratings_are_validated() {
        let session: NewPracticeSession = serde_json::from_str(
            r#"{"date": "2025-03-01", "entries": [{"tune_id": 1, "rating": 6}]}"#,
        )
        .unwrap();
        assert!(session.validate().is_err());

        let session: NewPracticeSession = serde_json::from_str(
            r#"{"date": "2025-03-01", "entries": [{"tune_id": 1, "rating": 5}]}"#,
        )
        .unwrap();
        assert!(session.validate().is_ok());
    }
}
