//! Postgres-backed document store.
//!
//! Every collection lives in a single JSONB table:
//!
//! ```sql
//! CREATE TABLE documents (
//!     collection TEXT  NOT NULL,
//!     id         TEXT  NOT NULL,
//!     body       JSONB NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (collection, id)
//! );
//! ```
//!
//! Top-level equality filters on string, boolean or null values run in SQL
//! (`body -> 'warehouse_id' = $2`), and `warehouse_id`/`product_id` carry
//! expression indexes. Whatever part of a filter cannot be expressed that way
//! is checked in-process with the same [`Filter::matches`] the in-memory store
//! uses. `count` and `sum` aggregate in SQL when the whole filter was pushed
//! down and fall back to `find` otherwise.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | any | `Backend` |
//! | PoolClosed / other | N/A | `Backend` |

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;

use super::{DocumentStore, Filter, StoreError, StoreResult};

const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, id)
)
"#,
    "CREATE INDEX IF NOT EXISTS documents_warehouse_id ON documents (collection, (body -> 'warehouse_id'))",
    "CREATE INDEX IF NOT EXISTS documents_product_id ON documents (collection, (body -> 'product_id'))",
];

/// Postgres-backed document store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and make sure the `documents` table exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<JsonValue>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.map(|r| {
            r.try_get::<Json<JsonValue>, _>("body")
                .map(|Json(v)| v)
                .map_err(|e| map_sqlx_error("get", e))
        })
        .transpose()
    }

    #[instrument(skip(self, filter), level = "debug")]
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<JsonValue>> {
        let plan = Pushdown::plan(filter);
        let mut query = plan.query("body", collection);
        query.push(" ORDER BY id");
        let rows = query
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let Json(doc) = row
                .try_get::<Json<JsonValue>, _>("body")
                .map_err(|e| map_sqlx_error("find", e))?;
            if plan.exact || filter.matches(&doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }

    #[instrument(skip(self, doc), level = "debug")]
    async fn insert(&self, collection: &str, id: &str, doc: JsonValue) -> StoreResult<()> {
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id)
            .bind(Json(doc))
            .execute(&*self.pool)
            .await
            .map_err(|e| match map_sqlx_error("insert", e) {
                StoreError::Duplicate { .. } => StoreError::Duplicate {
                    collection: collection.to_string(),
                    id: id.to_string(),
                },
                other => other,
            })?;
        Ok(())
    }

    #[instrument(skip(self, doc), level = "debug")]
    async fn replace(&self, collection: &str, id: &str, doc: JsonValue) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE documents SET body = $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(doc))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("replace", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, filter), level = "debug")]
    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let plan = Pushdown::plan(filter);
        if !plan.exact {
            return Ok(self.find(collection, filter).await?.len() as u64);
        }
        let total: i64 = plan
            .query("COUNT(*)", collection)
            .build_query_scalar()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", e))?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    #[instrument(skip(self, filter), level = "debug")]
    async fn sum(&self, collection: &str, filter: &Filter, field: &str) -> StoreResult<i64> {
        let plan = Pushdown::plan(filter);
        if !plan.exact || !is_plain_field(field) {
            let docs = self.find(collection, filter).await?;
            return Ok(docs
                .iter()
                .filter_map(|d| d.get(field).and_then(JsonValue::as_i64))
                .sum());
        }
        let select = format!(
            "COALESCE(SUM(CASE WHEN jsonb_typeof(body -> '{field}') = 'number' \
             THEN (body ->> '{field}')::numeric END), 0)::bigint"
        );
        plan.query(&select, collection)
            .build_query_scalar()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("sum", e))
    }
}

/// The part of a [`Filter`] Postgres evaluates: equality on top-level fields.
#[derive(Debug, PartialEq)]
struct Pushdown<'a> {
    conditions: Vec<(&'a str, &'a JsonValue)>,
    /// The conditions alone decide the filter.
    exact: bool,
}

impl<'a> Pushdown<'a> {
    fn plan(filter: &'a Filter) -> Self {
        let mut plan = Pushdown {
            conditions: Vec::new(),
            exact: true,
        };
        plan.collect(filter);
        plan
    }

    fn collect(&mut self, filter: &'a Filter) {
        match filter {
            Filter::All => {}
            Filter::And(parts) => parts.iter().for_each(|part| self.collect(part)),
            Filter::Eq(field, value) if is_plain_field(field) && is_scalar(value) => {
                self.conditions.push((field.as_str(), value));
            }
            _ => self.exact = false,
        }
    }

    /// `SELECT {select} FROM documents` restricted to the collection and the
    /// pushed-down conditions. Array fields match when any element is equal.
    fn query(&self, select: &str, collection: &str) -> QueryBuilder<'static, Postgres> {
        let mut query = QueryBuilder::new(format!("SELECT {select} FROM documents WHERE collection = "));
        query.push_bind(collection.to_string());
        for (field, value) in &self.conditions {
            query.push(format!(" AND (body -> '{field}' = "));
            query.push_bind(Json((*value).clone()));
            query.push(format!(
                " OR (jsonb_typeof(body -> '{field}') = 'array' AND body -> '{field}' @> jsonb_build_array("
            ));
            query.push_bind(Json((*value).clone()));
            query.push(")))");
        }
        query
    }
}

/// Field names inlined into SQL must be plain identifiers.
fn is_plain_field(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// JSONB and serde_json disagree on number equality (`1` vs `1.0`), so only
/// these compare identically on both sides.
fn is_scalar(value: &JsonValue) -> bool {
    matches!(value, JsonValue::String(_) | JsonValue::Bool(_) | JsonValue::Null)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::Duplicate {
                    collection: String::new(),
                    id: String::new(),
                };
            }
            StoreError::Backend(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Backend(format!("{} failed: {}", operation, other)),
    }
}
