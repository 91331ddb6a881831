//! Raw config types matching the JSON config file (settings, models, resources).

use crate::acl::Acl;
use crate::settings::Settings;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKeyConfig {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKeyConfig {
    pub fn columns(&self) -> Vec<String> {
        match self {
            PrimaryKeyConfig::Single(s) => vec![s.clone()],
            PrimaryKeyConfig::Composite(v) => v.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

impl ColumnTypeConfig {
    pub fn name(&self) -> &str {
        match self {
            ColumnTypeConfig::Simple(s) => s.as_str(),
            ColumnTypeConfig::Parameterized { name, .. } => name.as_str(),
        }
    }

    /// Type as written in DDL, including parameters (e.g. `varchar(255)`).
    pub fn ddl(&self) -> String {
        match self {
            ColumnTypeConfig::Simple(s) => s.clone(),
            ColumnTypeConfig::Parameterized { name, params: Some(p) } if !p.is_empty() => {
                let p: Vec<String> = p.iter().map(u32::to_string).collect();
                format!("{}({})", name, p.join(", "))
            }
            ColumnTypeConfig::Parameterized { name, .. } => name.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub enum ColumnDefaultConfig {
    Literal(String),
    Expression { expression: String },
}

impl<'de> Deserialize<'de> for ColumnDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) => Ok(ColumnDefaultConfig::Literal(s)),
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::String(s)) = obj.remove("expression") {
                    return Ok(ColumnDefaultConfig::Expression { expression: s });
                }
                if let Some(serde_json::Value::String(s)) =
                    obj.remove("value").or_else(|| obj.remove("literal"))
                {
                    return Ok(ColumnDefaultConfig::Literal(s));
                }
                Err(serde::de::Error::custom(format!(
                    "column default must be a string, {{ \"expression\": \"...\" }}, or {{ \"value\": \"...\" }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Err(serde::de::Error::custom(format!(
                "column default must be a string or {{ \"expression\": \"...\" }}; got {}",
                type_name_of_json(&other)
            ))),
        }
    }
}

fn type_name_of_json(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<ColumnDefaultConfig>,
}

fn default_true() -> bool {
    true
}

/// A table exposed through resources. `id` is how resources refer to it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    pub primary_key: PrimaryKeyConfig,
    pub columns: Vec<ColumnConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Container,
    Item,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilteringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Subset of supported operators; all of them when absent.
    #[serde(default)]
    pub operators: Option<Vec<String>>,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        FilteringConfig {
            enabled: true,
            operators: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub default: Vec<String>,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        OrderingConfig {
            enabled: true,
            default: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: Option<u64>,
}

fn default_page_size() -> u64 {
    50
}

fn default_max_page_size() -> Option<u64> {
    Some(250)
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig {
            enabled: true,
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// One resource registration: a container or item resource over a model plus its routing options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiResourceConfig {
    pub kind: ResourceKind,
    pub model: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub renderers: Option<Vec<String>>,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub acl: Option<Acl>,
    /// Key wrapping the payload (`items` / `item` by default).
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub item_key: Option<String>,
    /// Route used to build `Location` headers for created rows.
    #[serde(default)]
    pub location_route: Option<String>,
    #[serde(default)]
    pub default_fields: Option<Vec<String>>,
    #[serde(default)]
    pub filtering: FilteringConfig,
    #[serde(default)]
    pub ordering: OrderingConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

/// Whole config file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RestlerConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub resources: Vec<ApiResourceConfig>,
}
