use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{SqliteStore, ThresholdStore};
use crate::db::ThresholdRecord;
use crate::Result;

const SELECT_COLUMNS: &str =
    "SELECT id, scope_key, indicator, value, modified_by, modified_at FROM thresholds";

#[async_trait]
impl ThresholdStore for SqliteStore {
    async fn latest(&self, scope_key: &str, indicator: &str) -> Result<Option<ThresholdRecord>> {
        let sql = format!(
            "{} WHERE scope_key = ?1 AND indicator = ?2 ORDER BY modified_at DESC, id DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let record = sqlx::query_as::<_, ThresholdRecord>(&sql)
            .bind(scope_key)
            .bind(indicator)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn all_for_indicator(&self, indicator: &str) -> Result<Vec<ThresholdRecord>> {
        let sql = format!(
            "{} WHERE indicator = ?1 ORDER BY modified_at DESC, id DESC",
            SELECT_COLUMNS
        );
        let records = sqlx::query_as::<_, ThresholdRecord>(&sql)
            .bind(indicator)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn record(
        &self,
        scope_key: &str,
        indicator: &str,
        value: f64,
        modified_by: Option<&str>,
        modified_at: DateTime<Utc>,
    ) -> Result<ThresholdRecord> {
        let id = sqlx::query(
            r#"
            INSERT INTO thresholds (scope_key, indicator, value, modified_by, modified_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(scope_key)
        .bind(indicator)
        .bind(value)
        .bind(modified_by)
        .bind(modified_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(ThresholdRecord {
            id,
            scope_key: scope_key.to_string(),
            indicator: indicator.to_string(),
            value,
            modified_by: modified_by.map(str::to_string),
            modified_at,
        })
    }

    async fn all(&self) -> Result<Vec<ThresholdRecord>> {
        let sql = format!(
            "{} ORDER BY modified_at DESC, id DESC",
            SELECT_COLUMNS
        );
        let records = sqlx::query_as::<_, ThresholdRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_latest_uses_timestamp_not_insertion_order() {
        let store = SqliteStore::new(init_memory_database().await.unwrap());
        let newer = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();

        store
            .record("Manchon", "PPM Officiel", 120.0, Some("alice"), newer)
            .await
            .unwrap();
        store
            .record("Manchon", "PPM Officiel", 80.0, Some("bob"), older)
            .await
            .unwrap();

        let latest = store.latest("Manchon", "PPM Officiel").await.unwrap().unwrap();
        assert_eq!(latest.value, 120.0);
        assert_eq!(latest.modified_by.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_same_timestamp_prefers_highest_id() {
        let store = SqliteStore::new(init_memory_database().await.unwrap());
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();

        store.record("Rack", "Taux de Rebut", 2.0, None, at).await.unwrap();
        let second = store.record("Rack", "Taux de Rebut", 3.0, None, at).await.unwrap();

        let latest = store.latest("Rack", "Taux de Rebut").await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.value, 3.0);
    }

    #[tokio::test]
    async fn test_history_is_retained() {
        let store = SqliteStore::new(init_memory_database().await.unwrap());
        let at = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

        store.record("Total", "CNQ", 10.0, None, at).await.unwrap();
        store.record("Total", "CNQ", 12.0, None, at).await.unwrap();
        store.record("Rack", "Taux de Rebut", 2.0, None, at).await.unwrap();

        assert_eq!(store.all_for_indicator("CNQ").await.unwrap().len(), 2);
        assert_eq!(store.all().await.unwrap().len(), 3);
        assert!(store.latest("Moulage", "CNQ").await.unwrap().is_none());
    }
}
