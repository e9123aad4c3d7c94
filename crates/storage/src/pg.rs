//! PostgreSQL-backed [`RecordStore`] over the `post` table.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};

use postgate_core::{Record, RecordPatch};

use crate::error::StoreError;
use crate::store::RecordStore;

const INSERT_SQL: &str = "INSERT INTO post (id, user_id, title, body) VALUES ($1, $2, $3, $4)";
const LIST_SQL: &str = "SELECT id, user_id, title, body FROM post";
const GET_SQL: &str = "SELECT id, user_id, title, body FROM post WHERE id = $1 LIMIT 1";

/// Row shape of the `post` table. Columns are nullable in the schema, so
/// NULLs decode as zero/empty.
#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: Option<i32>,
    user_id: Option<i32>,
    title: Option<String>,
    body: Option<String>,
}

impl From<PostRow> for Record {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id.unwrap_or_default(),
            owner_id: row.user_id.unwrap_or_default(),
            title: row.title.unwrap_or_default(),
            body: row.body.unwrap_or_default(),
        }
    }
}

/// Store over an injected pool; cloning shares the pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Build `UPDATE post SET <supplied columns> WHERE id = $n`.
fn update_query<'a>(id: i32, patch: &'a RecordPatch) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE post SET ");
    let mut set = qb.separated(", ");
    if let Some(title) = &patch.title {
        set.push("title = ").push_bind_unseparated(title);
    }
    if let Some(body) = &patch.body {
        set.push("body = ").push_bind_unseparated(body);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert_batch(&self, records: &[Record]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for record in records {
            let result = sqlx::query(INSERT_SQL)
                .bind(record.id)
                .bind(record.owner_id)
                .bind(&record.title)
                .bind(&record.body)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!(id = record.id, error = %e, "failed to insert record");
                    e
                })?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        debug!(rows = inserted, "inserted batch");
        Ok(inserted)
    }

    async fn list(&self) -> Result<Vec<Record>, StoreError> {
        let rows = sqlx::query_as::<_, PostRow>(LIST_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn get(&self, id: i32) -> Result<Record, StoreError> {
        sqlx::query_as::<_, PostRow>(GET_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Record::from)
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, id: i32, patch: &RecordPatch) -> Result<u64, StoreError> {
        patch.validate()?;

        let mut query = update_query(id, patch);
        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i32) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM post WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(title: Option<&str>, body: Option<&str>) -> RecordPatch {
        RecordPatch {
            title: title.map(String::from),
            body: body.map(String::from),
        }
    }

    #[test]
    fn update_sets_only_supplied_columns() {
        let p = patch(Some("t"), None);
        assert_eq!(update_query(3, &p).sql(), "UPDATE post SET title = $1 WHERE id = $2");

        let p = patch(None, Some("b"));
        assert_eq!(update_query(3, &p).sql(), "UPDATE post SET body = $1 WHERE id = $2");

        let p = patch(Some("t"), Some("b"));
        assert_eq!(
            update_query(3, &p).sql(),
            "UPDATE post SET title = $1, body = $2 WHERE id = $3"
        );
    }

    #[test]
    fn null_columns_decode_as_defaults() {
        let record = Record::from(PostRow {
            id: Some(4),
            user_id: None,
            title: Some("t".into()),
            body: None,
        });
        assert_eq!(record.id, 4);
        assert_eq!(record.owner_id, 0);
        assert_eq!(record.body, "");
    }
}
