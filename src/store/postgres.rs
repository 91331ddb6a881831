//! PostgreSQL store: parameterized SQL from [`crate::sql`] executed on a `PgPool`.

use super::{Row, Store};
use crate::config::Model;
use crate::error::RestError;
use crate::query::{Filter, Query};
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RestError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(PgStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create schemas and tables for the given models. Existing tables are left alone.
    pub async fn ensure_tables(&self, models: &[Arc<Model>]) -> Result<(), RestError> {
        for model in models {
            sqlx::query(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                quote(&model.schema_name)
            ))
            .execute(&self.pool)
            .await?;
            let ddl = create_table_sql(model);
            tracing::debug!(sql = %ddl, "ensure table");
            sqlx::query(&ddl).execute(&self.pool).await?;
            tracing::info!(model = %model.id, table = %model.table_name, "table ready");
        }
        Ok(())
    }

    fn bind<'q>(
        q: &'q QueryBuf,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query
    }

    async fn fetch_many(&self, q: &QueryBuf) -> Result<Vec<Row>, RestError> {
        let rows = Self::bind(q).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Row>, RestError> {
        let row = Self::bind(q).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_json))
    }
}

#[async_trait]
impl Store for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn count(&self, model: &Model, filter: Option<&Filter>) -> Result<u64, RestError> {
        let q = sql::count(model, filter);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn fetch_all(&self, model: &Model, query: &Query) -> Result<Vec<Row>, RestError> {
        self.fetch_many(&sql::select_list(model, query)).await
    }

    async fn fetch_one(&self, model: &Model, keys: &Row) -> Result<Option<Row>, RestError> {
        self.fetch_optional(&sql::select_by_keys(model, keys)).await
    }

    async fn insert(&self, model: &Model, data: &Row) -> Result<Row, RestError> {
        self.fetch_optional(&sql::insert(model, data))
            .await?
            .ok_or(RestError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(&self, model: &Model, keys: &Row, data: &Row) -> Result<Option<Row>, RestError> {
        self.fetch_optional(&sql::update_by_keys(model, keys, data)).await
    }

    async fn delete(&self, model: &Model, keys: &Row) -> Result<Option<Row>, RestError> {
        self.fetch_optional(&sql::delete_by_keys(model, keys)).await
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` for a model: columns in model order, then the primary key.
pub fn create_table_sql(model: &Model) -> String {
    let mut col_defs: Vec<String> = model
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quote(&c.name), c.ddl_type);
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(d) = &c.default_sql {
                def.push_str(" DEFAULT ");
                def.push_str(d);
            }
            def
        })
        .collect();
    if !model.pk_columns.is_empty() {
        let pk: Vec<String> = model.pk_columns.iter().map(|c| quote(c)).collect();
        col_defs.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (\n  {}\n)",
        quote(&model.schema_name),
        quote(&model.table_name),
        col_defs.join(",\n  ")
    )
}

fn row_to_json(row: &PgRow) -> Row {
    use sqlx::{Column, Row as _};
    let mut map = Row::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i, col));
    }
    map
}

/// Decode one cell by its PostgreSQL type. Dates and timestamps become ISO 8601 strings.
fn cell_to_value(row: &PgRow, i: usize, col: &sqlx::postgres::PgColumn) -> Value {
    use sqlx::{Column, Row as _, TypeInfo};
    let ty = col.type_info().name().to_string();
    let decoded: Result<Option<Value>, sqlx::Error> = match ty.as_str() {
        "INT2" => row.try_get::<Option<i16>, _>(i).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(i).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(i).map(|v| v.map(Value::from)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(i)
            .map(|v| v.and_then(|n| serde_json::Number::from_f64(n as f64)).map(Value::Number)),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(i)
            .map(|v| v.and_then(serde_json::Number::from_f64).map(Value::Number)),
        "BOOL" => row.try_get::<Option<bool>, _>(i).map(|v| v.map(Value::Bool)),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(i)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)
            .map(|v| v.map(|d| Value::String(d.to_rfc3339()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(i)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(i)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(i),
        _ => row.try_get::<Option<String>, _>(i).map(|v| v.map(Value::String)),
    };
    match decoded {
        Ok(v) => v.unwrap_or(Value::Null),
        Err(e) => {
            tracing::warn!(column = %col.name(), pg_type = %ty, error = %e, "could not decode column");
            Value::Null
        }
    }
}
