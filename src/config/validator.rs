//! Config validation: referential integrity and resource consistency.

use crate::config::{ResourceKind, RestlerConfig};
use crate::error::ConfigError;
use crate::query::Operator;
use std::collections::HashSet;

pub fn validate(config: &RestlerConfig) -> Result<(), ConfigError> {
    let mut model_ids = HashSet::new();
    for m in &config.models {
        if !model_ids.insert(m.id.as_str()) {
            return Err(ConfigError::DuplicateName(format!("model {}", m.id)));
        }
        let mut column_names = HashSet::new();
        for c in &m.columns {
            if !column_names.insert(c.name.as_str()) {
                return Err(ConfigError::DuplicateName(format!("column {}.{}", m.id, c.name)));
            }
        }
        let pk = m.primary_key.columns();
        if pk.is_empty() {
            return Err(ConfigError::Validation(format!("model {} has no primary key", m.id)));
        }
        for col in pk {
            if !column_names.contains(col.as_str()) {
                return Err(ConfigError::InvalidPrimaryKey {
                    model_id: m.id.clone(),
                    column: col,
                });
            }
        }
    }

    let mut resource_names = HashSet::new();
    for r in &config.resources {
        let Some(model) = config.models.iter().find(|m| m.id == r.model) else {
            return Err(ConfigError::MissingReference {
                kind: "model",
                id: r.model.clone(),
            });
        };
        if let Some(name) = &r.name {
            if !resource_names.insert(name.as_str()) {
                return Err(ConfigError::DuplicateName(format!("resource {}", name)));
            }
        }
        let has_column = |name: &str| model.columns.iter().any(|c| c.name == name);
        for item in &r.ordering.default {
            let col = item.strip_prefix('-').unwrap_or(item);
            if !has_column(col) {
                return Err(ConfigError::MissingReference {
                    kind: "ordering column",
                    id: format!("{}.{}", model.id, col),
                });
            }
        }
        for f in r.default_fields.iter().flatten() {
            if !has_column(f) {
                return Err(ConfigError::MissingReference {
                    kind: "field",
                    id: format!("{}.{}", model.id, f),
                });
            }
        }
        for op in r.filtering.operators.iter().flatten() {
            if Operator::parse(op).is_none() {
                return Err(ConfigError::Validation(format!("unsupported SQL operator: {}", op)));
            }
        }
        if let Some(renderers) = &r.renderers {
            if renderers.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "resource over {} lists no renderers",
                    model.id
                )));
            }
        }
        if r.kind == ResourceKind::Container && r.id_field.is_some() {
            return Err(ConfigError::Validation(format!(
                "container resource over {} cannot have an id_field",
                model.id
            )));
        }
        if r.pagination.default_page_size == 0 {
            return Err(ConfigError::Validation(format!(
                "resource over {} has a zero default page size",
                model.id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: serde_json::Value) -> RestlerConfig {
        serde_json::from_value(json).unwrap()
    }

    fn base() -> serde_json::Value {
        serde_json::json!({
            "models": [{
                "id": "thing",
                "table": "things",
                "primary_key": "id",
                "columns": [
                    {"name": "id", "type": "serial", "default": {"expression": "nextval"}},
                    {"name": "value", "type": "text", "nullable": false}
                ]
            }],
            "resources": [
                {"kind": "container", "model": "thing"},
                {"kind": "item", "model": "thing", "id_field": "id"}
            ]
        })
    }

    #[test]
    fn accepts_valid_config() {
        validate(&config(base())).unwrap();
    }

    #[test]
    fn rejects_missing_model() {
        let mut json = base();
        json["resources"][0]["model"] = "other".into();
        assert!(matches!(
            validate(&config(json)),
            Err(ConfigError::MissingReference { kind: "model", .. })
        ));
    }

    #[test]
    fn rejects_bad_primary_key() {
        let mut json = base();
        json["models"][0]["primary_key"] = "uid".into();
        assert!(matches!(validate(&config(json)), Err(ConfigError::InvalidPrimaryKey { .. })));
    }

    #[test]
    fn rejects_unknown_ordering_column() {
        let mut json = base();
        json["resources"][0]["ordering"] = serde_json::json!({"default": ["-missing"]});
        assert!(validate(&config(json)).is_err());
    }

    #[test]
    fn rejects_unknown_operator() {
        let mut json = base();
        json["resources"][0]["filtering"] = serde_json::json!({"operators": ["=", "~~"]});
        assert!(matches!(validate(&config(json)), Err(ConfigError::Validation(_))));
    }
}
