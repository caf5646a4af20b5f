use async_trait::async_trait;

use super::{NqcStore, SqliteStore};
use crate::db::{NqcRecord, NqcUpdate};
use crate::workshops::TOTAL_TAG;
use crate::{time, Result};

#[async_trait]
impl NqcStore for SqliteStore {
    async fn get(&self, year: i32, month: u32) -> Result<Option<NqcRecord>> {
        let record = sqlx::query_as::<_, NqcRecord>(
            r#"
            SELECT month, year, workshop, value, threshold, ytd_snapshot, updated_at
            FROM non_quality_cost
            WHERE year = ?1 AND month = ?2 AND workshop = ?3
            "#,
        )
        .bind(year)
        .bind(month)
        .bind(TOTAL_TAG)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn upsert(&self, year: i32, month: u32, update: NqcUpdate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO non_quality_cost (month, year, workshop, value, threshold, ytd_snapshot, updated_at)
            VALUES (?1, ?2, ?3, COALESCE(?4, 0), ?5, ?6, ?7)
            ON CONFLICT (month, year, workshop) DO UPDATE SET
                value = COALESCE(?4, value),
                threshold = COALESCE(?5, threshold),
                ytd_snapshot = COALESCE(?6, ytd_snapshot),
                updated_at = ?7
            "#,
        )
        .bind(month)
        .bind(year)
        .bind(TOTAL_TAG)
        .bind(update.value)
        .bind(update.threshold)
        .bind(update.ytd_snapshot)
        .bind(time::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Most recently created record wins. Value and snapshot edits bump
    // `updated_at` without touching the threshold, so they must not reorder.
    async fn latest_threshold(&self, year: Option<i32>) -> Result<Option<f64>> {
        let threshold: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT threshold
            FROM non_quality_cost
            WHERE workshop = ?1 AND threshold IS NOT NULL
              AND (?2 IS NULL OR year = ?2)
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(TOTAL_TAG)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(threshold)
    }

    async fn set_threshold_everywhere(&self, threshold: f64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE non_quality_cost SET threshold = ?1, updated_at = ?2 WHERE workshop = ?3",
        )
        .bind(threshold)
        .bind(time::now())
        .bind(TOTAL_TAG)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_partial_update_keeps_other_columns() {
        let store = SqliteStore::new(init_memory_database().await.unwrap());
        store
            .upsert(
                2025,
                1,
                NqcUpdate {
                    value: Some(4.5),
                    threshold: Some(12.0),
                    ytd_snapshot: None,
                },
            )
            .await
            .unwrap();
        store
            .upsert(
                2025,
                1,
                NqcUpdate {
                    ytd_snapshot: Some(6.2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.get(2025, 1).await.unwrap().unwrap();
        assert_eq!(record.value, 4.5);
        assert_eq!(record.threshold, Some(12.0));
        assert_eq!(record.ytd_snapshot, Some(6.2));
        assert_eq!(record.workshop, "Total");
    }

    #[tokio::test]
    async fn test_snapshot_only_insert_has_no_threshold() {
        let store = SqliteStore::new(init_memory_database().await.unwrap());
        store
            .upsert(
                2024,
                1,
                NqcUpdate {
                    ytd_snapshot: Some(3.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.get(2024, 1).await.unwrap().unwrap();
        assert_eq!(record.value, 0.0);
        assert_eq!(record.threshold, None);
        assert_eq!(store.latest_threshold(Some(2024)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_threshold_everywhere_touches_every_record() {
        let store = SqliteStore::new(init_memory_database().await.unwrap());
        for month in 1..=3 {
            store
                .upsert(
                    2025,
                    month,
                    NqcUpdate {
                        value: Some(month as f64),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let changed = store.set_threshold_everywhere(9.5).await.unwrap();
        assert_eq!(changed, 3);
        assert_eq!(store.latest_threshold(Some(2025)).await.unwrap(), Some(9.5));
        assert_eq!(store.latest_threshold(Some(2023)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_value_edit_does_not_change_latest_threshold() {
        let store = SqliteStore::new(init_memory_database().await.unwrap());
        for (month, threshold) in [(1, 10.0), (2, 12.0)] {
            store
                .upsert(
                    2025,
                    month,
                    NqcUpdate {
                        value: Some(3.0),
                        threshold: Some(threshold),
                        ytd_snapshot: None,
                    },
                )
                .await
                .unwrap();
        }
        store
            .upsert(
                2025,
                1,
                NqcUpdate {
                    value: Some(4.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(store.latest_threshold(Some(2025)).await.unwrap(), Some(12.0));
        assert_eq!(store.latest_threshold(None).await.unwrap(), Some(12.0));
    }
}
