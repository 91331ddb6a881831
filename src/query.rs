//! Query-string filtering, ordering and pagination translated into a store-neutral [`Query`].
//!
//! - `filters={"value like": "o%", "id >": 1, "$operator": "or"}`
//! - `ordering=value,-id` (repeatable)
//! - `page=2&page_size=10` (`page_size=*` disables pagination)

use crate::config::Model;
use crate::error::RestError;
use crate::params::{get_param, get_params, QueryParams};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Like,
    NotLike,
    ILike,
    NotILike,
    Is,
    IsNot,
}

impl Operator {
    pub const ALL: [Operator; 14] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::In,
        Operator::NotIn,
        Operator::Like,
        Operator::NotLike,
        Operator::ILike,
        Operator::NotILike,
        Operator::Is,
        Operator::IsNot,
    ];

    /// Case-insensitive; inner whitespace is normalised (`"NOT  in"` is `not in`).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        Operator::ALL.into_iter().find(|op| op.as_str() == normalized)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::ILike => "ilike",
            Operator::NotILike => "not ilike",
            Operator::Is => "is",
            Operator::IsNot => "is not",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub conjunction: Conjunction,
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// Everything a store needs to list rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub ordering: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Key under which the boolean operator travels inside `filters`.
pub const BOOLEAN_OPERATOR_KEY: &str = "$operator";

/// Parse the `filters` param against `model`, allowing only `supported` operators.
pub fn parse_filters(
    model: &Model,
    params: &QueryParams,
    supported: &[Operator],
) -> Result<Option<Filter>, RestError> {
    let Some(filters) = get_param::<Value>(params, "filters")? else {
        return Ok(None);
    };
    let mut filters: Map<String, Value> = match filters {
        Value::Object(m) => m,
        _ => return Err(RestError::BadRequest("filters must be a JSON object".into())),
    };
    if filters.is_empty() {
        return Ok(None);
    }

    let conjunction = match filters.remove(BOOLEAN_OPERATOR_KEY) {
        None => Conjunction::And,
        Some(Value::String(s)) => match s.to_lowercase().as_str() {
            "and" => Conjunction::And,
            "or" => Conjunction::Or,
            _ => {
                return Err(RestError::BadRequest(format!(
                    "Unsupported boolean operator: {}",
                    s
                )))
            }
        },
        Some(other) => {
            return Err(RestError::BadRequest(format!(
                "Unsupported boolean operator: {}",
                other
            )))
        }
    };

    let mut conditions = Vec::with_capacity(filters.len());
    for (key, value) in filters {
        let (name, op) = match key.split_once(' ') {
            Some((name, op)) => (name, op),
            None => (key.as_str(), "="),
        };
        let column = model.require_column(name)?;
        let op = Operator::parse(op)
            .filter(|op| supported.contains(op))
            .ok_or_else(|| {
                RestError::BadRequest(format!("Unsupported SQL operator: {}", op.to_lowercase()))
            })?;
        let value = match op {
            Operator::In | Operator::NotIn => match value {
                Value::Array(items) => Value::Array(
                    items
                        .into_iter()
                        .map(|v| column.coerce(v))
                        .collect::<Result<_, _>>()?,
                ),
                _ => {
                    return Err(RestError::BadRequest(format!(
                        "Operator {} on {} requires a list",
                        op.as_str(),
                        name
                    )))
                }
            },
            Operator::Like | Operator::NotLike | Operator::ILike | Operator::NotILike => {
                if !value.is_string() {
                    return Err(RestError::BadRequest(format!(
                        "Operator {} on {} requires a string pattern",
                        op.as_str(),
                        name
                    )));
                }
                value
            }
            Operator::Is | Operator::IsNot => {
                if !(value.is_null() || value.is_boolean()) {
                    return Err(RestError::BadRequest(format!(
                        "Operator {} on {} requires null, true or false",
                        op.as_str(),
                        name
                    )));
                }
                value
            }
            _ => {
                if value.is_array() || value.is_object() {
                    return Err(RestError::BadRequest(format!(
                        "Operator {} on {} requires a scalar value",
                        op.as_str(),
                        name
                    )));
                }
                column.coerce(value)?
            }
        };
        conditions.push(Condition {
            column: name.to_string(),
            op,
            value,
        });
    }

    Ok(Some(Filter {
        conjunction,
        conditions,
    }))
}

/// Parse `ordering` (repeatable, comma separated, `-` for descending); falls back to `default`.
pub fn parse_ordering(
    model: &Model,
    params: &QueryParams,
    default: &[String],
) -> Result<Vec<OrderBy>, RestError> {
    let requested: Vec<String> = get_params::<Vec<String>>(params, "ordering")?
        .into_iter()
        .flatten()
        .filter(|item| !item.is_empty())
        .collect();
    let items = if requested.is_empty() {
        default
    } else {
        &requested[..]
    };
    items
        .iter()
        .map(|item| {
            let (column, descending) = match item.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (item.as_str(), false),
            };
            model.require_column(column)?;
            Ok(OrderBy {
                column: column.to_string(),
                descending,
            })
        })
        .collect()
}

/// Requested page after defaults and clamping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub page_size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaginationData {
    pub pages: u64,
    pub current_page: u64,
    pub previous_page: u64,
    pub next_page: u64,
    pub page_size: u64,
    pub count: u64,
}

impl Page {
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }

    pub fn data(&self, count: u64) -> PaginationData {
        PaginationData {
            pages: count.div_ceil(self.page_size),
            current_page: self.page,
            previous_page: if self.page == 1 { 1 } else { self.page - 1 },
            next_page: self.page + 1,
            page_size: self.page_size,
            count,
        }
    }
}

/// Parse `page` and `page_size`. `None` when the client disabled pagination with `page_size=*`.
pub fn parse_page(
    params: &QueryParams,
    default_page_size: u64,
    max_page_size: Option<u64>,
) -> Result<Option<Page>, RestError> {
    if params.get("page_size").map(str::trim) == Some("*") {
        return Ok(None);
    }
    let page = get_param::<i64>(params, "page")?.unwrap_or(1).max(1) as u64;
    let page_size = match get_param::<i64>(params, "page_size")? {
        None => default_page_size,
        Some(n) if n < 1 => {
            return Err(RestError::BadRequest(format!(
                "page_size must be at least 1: {}",
                n
            )))
        }
        Some(n) => n as u64,
    };
    let page_size = match max_page_size {
        Some(max) if page_size > max => max,
        _ => page_size,
    };
    // Keep the offset within a bigint.
    let page = page.min(i64::MAX as u64 / page_size);
    Ok(Some(Page { page, page_size }))
}
