use async_trait::async_trait;

use super::{CounterStore, SqliteStore};
use crate::kpi::CounterKind;
use crate::{time, Result};

#[async_trait]
impl CounterStore for SqliteStore {
    async fn sum(
        &self,
        kind: CounterKind,
        month: u32,
        year: i32,
        workshop: &str,
        sub_unit: Option<&str>,
    ) -> Result<f64> {
        // Table and column names come from CounterKind, never from input
        let sql = format!(
            r#"
            SELECT CAST(COALESCE(SUM({column}), 0) AS REAL)
            FROM {table}
            WHERE month = ?1 AND year = ?2 AND workshop = ?3
              AND (?4 IS NULL OR sub_unit = ?4)
            "#,
            column = kind.value_column(),
            table = kind.table(),
        );

        let total: f64 = sqlx::query_scalar(&sql)
            .bind(month)
            .bind(year)
            .bind(workshop)
            .bind(sub_unit)
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    async fn upsert(
        &self,
        kind: CounterKind,
        month: u32,
        year: i32,
        workshop: &str,
        sub_unit: &str,
        value: f64,
    ) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {table} (month, year, workshop, sub_unit, {column}, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (month, year, workshop, sub_unit)
            DO UPDATE SET {column} = excluded.{column}, updated_at = excluded.updated_at
            "#,
            column = kind.value_column(),
            table = kind.table(),
        );

        let query = sqlx::query(&sql)
            .bind(month)
            .bind(year)
            .bind(workshop)
            .bind(sub_unit);
        let query = if kind.is_monetary() {
            query.bind(value)
        } else {
            query.bind(value.round() as i64)
        };

        query.bind(time::now()).execute(&self.pool).await?;

        Ok(())
    }
}
