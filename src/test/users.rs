#[cfg(test)]
mod tests {
    use crate::db::{authenticate_user, create_user, get_user, get_user_by_username};
    use crate::error::AppError;
    use crate::models::NewUser;
    use crate::test::test_db::{STANDARD_PASSWORD, TestDbBuilder};

    #[rocket::async_test]
    async fn test_get_user() {
        let test_db = TestDbBuilder::new()
            .user("test_user")
            .build()
            .await
            .expect("Failed to build test database");

        let id = test_db.user_id("test_user");
        let user = get_user(&test_db.pool, id).await.expect("Failed to get user");
        assert_eq!(user.username, "test_user");

        let by_name = get_user_by_username(&test_db.pool, "test_user")
            .await
            .expect("Failed to get user by username");
        assert_eq!(by_name.id, id);
    }

    #[rocket::async_test]
    async fn test_missing_user_is_not_found() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        assert!(matches!(
            get_user(&test_db.pool, 999).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            get_user_by_username(&test_db.pool, "ghost").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn test_duplicate_registration_conflicts() {
        let test_db = TestDbBuilder::new().user("alice").build().await.unwrap();
        assert_eq!(test_db.count("users").await, 1);

        let result = create_user(&test_db.pool, &NewUser::new("alice", "another-password")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(test_db.count("users").await, 1);
    }

    #[rocket::async_test]
    async fn test_password_is_hashed() {
        let test_db = TestDbBuilder::new().user("alice").build().await.unwrap();

        let stored: String =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE username = 'alice'")
                .fetch_one(&test_db.pool)
                .await
                .unwrap();

        assert_ne!(stored, STANDARD_PASSWORD);
        assert!(stored.starts_with("$2"));
    }

    #[rocket::async_test]
    async fn test_invalid_registration_persists_nothing() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        for (username, password) in [
            ("ab", "long enough"),
            ("carol", "x"),
            (&*"u".repeat(51), "long enough"),
            ("carol", &*"p".repeat(73)),
        ] {
            let result = create_user(&test_db.pool, &NewUser::new(username, password)).await;
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "{:?} should be rejected",
                username
            );
        }

        assert_eq!(test_db.count("users").await, 0);
    }

    #[rocket::async_test]
    async fn test_authenticate_user() {
        let test_db = TestDbBuilder::new()
            .user_with_password("alice", "correct horse")
            .build()
            .await
            .unwrap();

        let user = authenticate_user(&test_db.pool, "alice", "correct horse")
            .await
            .expect("valid credentials");
        assert_eq!(user.id, test_db.user_id("alice"));

        assert!(matches!(
            authenticate_user(&test_db.pool, "alice", "wrong horse").await,
            Err(AppError::Authentication(_))
        ));
        assert!(matches!(
            authenticate_user(&test_db.pool, "nobody", "correct horse").await,
            Err(AppError::Authentication(_))
        ));
    }
}
