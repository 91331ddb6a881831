//! Load config from a JSON file or string and resolve it into runtime models.

use crate::config::resolved::{ColumnInfo, ColumnKind, Model, ResolvedModels};
use crate::config::types::*;
use crate::config::{validate, RestlerConfig};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_SCHEMA: &str = "public";

/// Build resolved models from the config (validates first).
pub fn resolve(config: &RestlerConfig) -> Result<ResolvedModels, ConfigError> {
    validate(config)?;

    let mut models = Vec::with_capacity(config.models.len());
    let mut model_by_id = HashMap::new();
    for m in &config.models {
        let columns: Vec<ColumnInfo> = m.columns.iter().map(resolve_column).collect();
        let model = Arc::new(Model {
            id: m.id.clone(),
            schema_name: m.schema.clone().unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            table_name: m.table.clone(),
            pk_columns: m.primary_key.columns(),
            columns,
        });
        tracing::debug!(model = %model.id, table = %model.table_name, "resolved model");
        model_by_id.insert(m.id.clone(), model.clone());
        models.push(model);
    }

    Ok(ResolvedModels {
        models,
        model_by_id,
    })
}

fn resolve_column(c: &ColumnConfig) -> ColumnInfo {
    let ddl_type = c.type_.ddl();
    let is_serial = is_serial_type(c.type_.name());
    let default_sql = c.default.as_ref().map(|d| match d {
        ColumnDefaultConfig::Literal(s) => s.clone(),
        ColumnDefaultConfig::Expression { expression } => expression.clone(),
    });
    ColumnInfo {
        name: c.name.clone(),
        kind: ColumnKind::from_type_name(c.type_.name()),
        pg_type: cast_type(&ddl_type),
        ddl_type,
        nullable: c.nullable,
        has_default: is_serial || default_sql.is_some(),
        default_sql,
    }
}

fn is_serial_type(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "serial" | "serial4" | "smallserial" | "bigserial" | "serial8"
    )
}

/// Type used in `$n::type` casts. Serial pseudo-types cannot appear in casts, so they map
/// to their storage type. Modifiers are dropped so the column, not the cast, enforces
/// length and precision.
fn cast_type(ddl_type: &str) -> String {
    if ddl_type.contains('.') {
        // Schema-qualified custom type (e.g. sample.order_status)
        return ddl_type.to_string();
    }
    let lower = without_modifiers(ddl_type).to_lowercase();
    match lower.as_str() {
        "serial" | "serial4" => "int4".into(),
        "smallserial" => "int2".into(),
        "bigserial" | "serial8" => "int8".into(),
        _ => lower,
    }
}

/// `varchar(64)` -> `varchar`, `timestamp(3) with time zone` -> `timestamp with time zone`.
fn without_modifiers(ddl_type: &str) -> String {
    match (ddl_type.find('('), ddl_type.find(')')) {
        (Some(open), Some(close)) if open < close => {
            format!("{}{}", ddl_type[..open].trim_end(), &ddl_type[close + 1..])
        }
        _ => ddl_type.to_string(),
    }
}

pub fn load_from_str(json: &str) -> Result<RestlerConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read and parse a config file. Validation happens in [`resolve`].
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<RestlerConfig, ConfigError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let config = load_from_str(&text)?;
    tracing::info!(
        path = %path.display(),
        models = config.models.len(),
        resources = config.resources.len(),
        "loaded config"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "models": [{
            "id": "thing",
            "schema": "app",
            "table": "things",
            "primary_key": "id",
            "columns": [
                {"name": "id", "type": "bigserial"},
                {"name": "value", "type": {"name": "varchar", "params": [64]}, "nullable": false},
                {"name": "created_at", "type": "timestamptz", "default": {"expression": "NOW()"}}
            ]
        }],
        "resources": [{"kind": "container", "model": "thing"}]
    }"#;

    #[test]
    fn resolves_models() {
        let config = load_from_str(CONFIG).unwrap();
        let resolved = resolve(&config).unwrap();
        let model = resolved.model("thing").unwrap();
        assert_eq!(model.schema_name, "app");
        assert_eq!(model.pk_columns, vec!["id".to_string()]);

        let id = model.column("id").unwrap();
        assert_eq!(id.pg_type, "int8");
        assert!(id.has_default);
        assert_eq!(id.kind, ColumnKind::Integer);

        let value = model.column("value").unwrap();
        assert_eq!(value.ddl_type, "varchar(64)");
        assert_eq!(value.pg_type, "varchar");
        assert!(!value.nullable && !value.has_default);

        let created = model.column("created_at").unwrap();
        assert_eq!(created.default_sql.as_deref(), Some("NOW()"));
    }

    #[test]
    fn schema_defaults_to_public() {
        let mut config = load_from_str(CONFIG).unwrap();
        config.models[0].schema = None;
        let resolved = resolve(&config).unwrap();
        assert_eq!(resolved.model("thing").unwrap().schema_name, "public");
    }

    #[test]
    fn casts_drop_modifiers() {
        assert_eq!(cast_type("numeric(10, 2)"), "numeric");
        assert_eq!(cast_type("timestamp(3) with time zone"), "timestamp with time zone");
        assert_eq!(cast_type("VARCHAR(8)[]"), "varchar[]");
        assert_eq!(cast_type("serial4"), "int4");
        assert_eq!(cast_type("sample.order_status"), "sample.order_status");
    }

    #[test]
    fn parse_errors_are_load_errors() {
        assert!(matches!(load_from_str("{"), Err(ConfigError::Load(_))));
    }
}
