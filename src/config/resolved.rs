//! Resolved models: config validated and flattened for runtime use.

use crate::error::RestError;
use crate::params::as_bool;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Broad column type, used to coerce incoming values and to pick SQL casts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Numeric,
    Boolean,
    Text,
    Uuid,
    Timestamp,
    Date,
    Json,
    Other,
}

impl ColumnKind {
    pub fn from_type_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        let base = lower.split('(').next().unwrap_or("").trim();
        match base {
            "smallint" | "integer" | "int" | "int2" | "int4" | "int8" | "bigint" | "serial"
            | "smallserial" | "bigserial" | "serial4" | "serial8" => ColumnKind::Integer,
            "real" | "float4" | "float8" | "double precision" => ColumnKind::Float,
            "numeric" | "decimal" => ColumnKind::Numeric,
            "bool" | "boolean" => ColumnKind::Boolean,
            "text" | "varchar" | "character varying" | "char" | "character" | "citext" => {
                ColumnKind::Text
            }
            "uuid" => ColumnKind::Uuid,
            "date" => ColumnKind::Date,
            "json" | "jsonb" => ColumnKind::Json,
            b if b.starts_with("timestamp") => ColumnKind::Timestamp,
            _ => ColumnKind::Other,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    /// PostgreSQL type used for `$n::type` casts (serial types mapped to their integer type).
    pub pg_type: String,
    /// Type as written in DDL.
    pub ddl_type: String,
    pub nullable: bool,
    /// Whether the column has a DB default (serial, gen_random_uuid(), NOW()).
    pub has_default: bool,
    pub default_sql: Option<String>,
}

impl ColumnInfo {
    /// Convert a request value to the column's type. Form posts carry strings only.
    pub fn coerce(&self, value: Value) -> Result<Value, RestError> {
        let s = match value {
            Value::String(s) => s,
            other => return Ok(other),
        };
        let trimmed = s.trim();
        let bad = || {
            RestError::BadRequest(format!(
                "Could not convert value for column {}: {:?}",
                self.name, s
            ))
        };
        Ok(match self.kind {
            ColumnKind::Integer => {
                let n: i64 = trimmed.parse().map_err(|_| bad())?;
                Value::Number(n.into())
            }
            ColumnKind::Float => {
                let f: f64 = trimmed.parse().map_err(|_| bad())?;
                Value::Number(Number::from_f64(f).ok_or_else(bad)?)
            }
            ColumnKind::Boolean => Value::Bool(as_bool(trimmed).map_err(|_| bad())?),
            ColumnKind::Uuid => {
                let u = uuid::Uuid::parse_str(trimmed).map_err(|_| bad())?;
                Value::String(u.to_string())
            }
            _ => Value::String(s),
        })
    }
}

/// Runtime description of a table, the analogue of an ORM model class.
#[derive(Clone, Debug)]
pub struct Model {
    pub id: String,
    pub schema_name: String,
    pub table_name: String,
    pub pk_columns: Vec<String>,
    pub columns: Vec<ColumnInfo>,
}

impl Model {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Column lookup that turns a miss into the 400 clients see for bad filter/sort/field names.
    pub fn require_column(&self, name: &str) -> Result<&ColumnInfo, RestError> {
        self.column(name).ok_or_else(|| {
            RestError::BadRequest(format!("Unknown column on model {}: {}", self.id, name))
        })
    }

    pub fn coerce(&self, name: &str, value: Value) -> Result<Value, RestError> {
        self.require_column(name)?.coerce(value)
    }

    /// Coerce every field of a request body; unknown columns are rejected.
    pub fn coerce_data(&self, data: Map<String, Value>) -> Result<Map<String, Value>, RestError> {
        let mut out = Map::with_capacity(data.len());
        for (name, value) in data {
            let value = self.coerce(&name, value)?;
            out.insert(name, value);
        }
        Ok(out)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModels {
    pub models: Vec<Arc<Model>>,
    pub model_by_id: HashMap<String, Arc<Model>>,
}

impl ResolvedModels {
    pub fn model(&self, id: &str) -> Option<&Arc<Model>> {
        self.model_by_id.get(id)
    }
}
