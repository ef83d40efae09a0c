#[cfg(test)]
pub mod test_db {
    use crate::db::{create_recording, create_tune, create_user};
    use crate::error::AppError;
    use crate::models::{NewTune, NewUser, Recording, RecordingMetadata};
    use crate::storage::{BlobStore, LocalBlobStore, SharedBlobStore};
    use crate::upload::AudioUpload;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Once};
    use tempfile::TempDir;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        tunes: Vec<TestTune>,
    }

    pub struct TestUser {
        pub username: String,
        pub password: String,
    }

    pub struct TestTune {
        pub owner: String,
        pub title: String,
        pub status: Option<String>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn user_with_password(mut self, username: &str, password: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                password: password.to_string(),
            });
            self
        }

        pub fn tune(mut self, owner: &str, title: &str) -> Self {
            self.tunes.push(TestTune {
                owner: owner.to_string(),
                title: title.to_string(),
                status: None,
            });
            self
        }

        pub fn tune_with_status(mut self, owner: &str, title: &str, status: &str) -> Self {
            self.tunes.push(TestTune {
                owner: owner.to_string(),
                title: title.to_string(),
                status: Some(status.to_string()),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
                    .with_test_writer()
                    .try_init();
            });

            // One connection: every handle sees the same in-memory database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut tune_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let created = create_user(&pool, &NewUser::new(&user.username, &user.password)).await?;
                user_id_map.insert(user.username.clone(), created.id);
            }

            for tune in &self.tunes {
                let owner_id = user_id_map.get(&tune.owner).copied().ok_or_else(|| {
                    AppError::Internal(format!("Unknown tune owner {}", tune.owner))
                })?;

                let mut new_tune = NewTune::titled(&tune.title);
                if let Some(status) = &tune.status {
                    new_tune.status = status.clone();
                }

                let created = create_tune(&pool, owner_id, &new_tune).await?;
                tune_id_map.insert(tune.title.clone(), created.id);
            }

            let blob_dir = tempfile::tempdir()?;
            let blobs: SharedBlobStore = Arc::new(LocalBlobStore::new(blob_dir.path()));

            Ok(TestDb {
                pool,
                user_id_map,
                tune_id_map,
                blob_dir,
                blobs,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub tune_id_map: HashMap<String, i64>,
        pub blob_dir: TempDir,
        pub blobs: SharedBlobStore,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> i64 {
            self.user_id_map[username]
        }

        pub fn tune_id(&self, title: &str) -> i64 {
            self.tune_id_map[title]
        }

        pub fn blobs(&self) -> &dyn BlobStore {
            self.blobs.as_ref()
        }

        pub fn blob_root(&self) -> &Path {
            self.blob_dir.path()
        }

        pub fn blob_count(&self) -> usize {
            std::fs::read_dir(self.blob_root())
                .map(|entries| entries.count())
                .unwrap_or(0)
        }

        pub async fn count(&self, table: &str) -> i64 {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            sqlx::query_scalar::<_, i64>(&sql)
                .fetch_one(&self.pool)
                .await
                .expect("count query should succeed")
        }

        pub async fn upload_recording(
            &self,
            username: &str,
            tune_title: &str,
            original_name: &str,
        ) -> Recording {
            let upload = wav_upload(original_name);
            create_recording(
                &self.pool,
                self.blobs(),
                self.user_id(username),
                self.tune_id(tune_title),
                &upload,
                RecordingMetadata::default(),
            )
            .await
            .expect("upload should succeed")
        }
    }

    pub fn wav_upload(original_name: &str) -> AudioUpload {
        AudioUpload {
            original_name: original_name.to_string(),
            content_type: Some("audio/wav".to_string()),
            bytes: b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec(),
        }
    }

    /// Two musicians with a couple of tunes each.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user("alice")
            .user("bob")
            .tune("alice", "Autumn Leaves")
            .tune_with_status("alice", "Blue Bossa", "mastered")
            .tune("bob", "Solar")
            .build()
            .await
            .expect("Failed to build test database")
    }
}

#[cfg(test)]
pub mod test_utils {
    pub use super::test_db::{
        STANDARD_PASSWORD, TestDb, TestDbBuilder, create_standard_test_db, wav_upload,
    };

    use crate::auth::AuthConfig;
    use crate::build_rocket;
    use crate::config::{AppConfig, TelemetryConfig};
    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;

    pub const TEST_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";
    pub const BOUNDARY: &str = "X-PRACTICE-TRACKER-BOUNDARY";

    pub fn test_config(test_db: &TestDb) -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            upload_dir: test_db.blob_root().to_path_buf(),
            auth: AuthConfig {
                secret: TEST_SECRET.to_string(),
                token_ttl_hours: 24,
            },
            telemetry: TelemetryConfig {
                otlp_endpoint: None,
                otlp_api_key: None,
            },
        }
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = build_rocket(
            test_db.pool.clone(),
            test_config(&test_db),
            test_db.blobs.clone(),
        );

        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        (client, test_db)
    }

    pub async fn login_test_user(client: &Client, username: &str, password: &str) -> String {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "login failed for {}", username);

        let body: serde_json::Value = response.into_json().await.expect("login response body");
        body["access_token"]
            .as_str()
            .expect("access token in response")
            .to_string()
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", token))
    }

    pub fn multipart_content_type() -> ContentType {
        ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
    }

    /// Builds a multipart body with text fields followed by a single `file` part.
    /// `content_type: None` leaves the part without a Content-Type line.
    pub fn multipart_body(
        fields: &[(&str, &str)],
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Vec<u8> {
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }

        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        if let Some(content_type) = content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        body
    }
}
