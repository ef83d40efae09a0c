#[cfg(test)]
mod tests {
    use crate::db::{
        create_performance, delete_performance, get_performance, list_performances,
        update_performance,
    };
    use crate::error::AppError;
    use crate::models::{NewPerformance, PerformancePatch};
    use crate::test::test_db::create_standard_test_db;
    use chrono::NaiveDate;

    fn gig(title: &str, day: u32) -> NewPerformance {
        NewPerformance {
            title: title.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 7, day).unwrap(),
            time: None,
            venue: None,
            notes: None,
        }
    }

    #[rocket::async_test]
    async fn test_performance_crud() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user_id("alice");

        let early = create_performance(&test_db.pool, alice, &gig("Jam session", 3))
            .await
            .unwrap();
        let late = create_performance(&test_db.pool, alice, &gig("Wedding", 20))
            .await
            .unwrap();

        let titles: Vec<String> = list_performances(&test_db.pool, alice)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Wedding", "Jam session"]);

        let patch: PerformancePatch =
            serde_json::from_str(r#"{"venue": "Town Hall", "time": "18:30"}"#).unwrap();
        let updated = update_performance(&test_db.pool, alice, late.id, patch)
            .await
            .unwrap();
        assert_eq!(updated.venue.as_deref(), Some("Town Hall"));
        assert_eq!(updated.time.as_deref(), Some("18:30"));
        assert_eq!(updated.title, "Wedding");

        delete_performance(&test_db.pool, alice, early.id)
            .await
            .unwrap();
        assert!(matches!(
            get_performance(&test_db.pool, alice, early.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(test_db.count("performances").await, 1);
    }

    #[rocket::async_test]
    async fn test_title_required() {
        let test_db = create_standard_test_db().await;
        let alice = test_db.user_id("alice");

        assert!(matches!(
            create_performance(&test_db.pool, alice, &gig("", 1)).await,
            Err(AppError::Validation(_))
        ));
    }
}
