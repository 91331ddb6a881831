//! In-process store evaluating [`Query`] the way PostgreSQL would.
//!
//! Used by tests and demos. Tables are created on first use; serial primary
//! keys count up from 1; NULLs sort last ascending and first descending.

use super::{Row, Store};
use crate::config::{ColumnInfo, ColumnKind, Model};
use crate::error::RestError;
use crate::query::{Condition, Conjunction, Filter, Operator, OrderBy, Query};
use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    serials: HashMap<String, i64>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

fn table_key(model: &Model) -> String {
    format!("{}.{}", model.schema_name, model.table_name)
}

fn poisoned<T>(_: T) -> RestError {
    RestError::Internal("memory store lock poisoned".into())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert many rows at once, e.g. fixtures.
    pub async fn seed(&self, model: &Model, rows: Vec<Row>) -> Result<(), RestError> {
        for row in rows {
            self.insert(model, &row).await?;
        }
        Ok(())
    }

    fn select(&self, model: &Model, filter: Option<&Filter>) -> Result<Vec<Row>, RestError> {
        let matcher = Matcher::new(filter)?;
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(&table_key(model))
            .map(|t| t.rows.iter().filter(|r| matcher.matches(r)).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn count(&self, model: &Model, filter: Option<&Filter>) -> Result<u64, RestError> {
        Ok(self.select(model, filter)?.len() as u64)
    }

    async fn fetch_all(&self, model: &Model, query: &Query) -> Result<Vec<Row>, RestError> {
        let mut rows = self.select(model, query.filter.as_ref())?;
        let ordering: Vec<OrderBy> = if query.ordering.is_empty() {
            model
                .pk_columns
                .iter()
                .map(|c| OrderBy { column: c.clone(), descending: false })
                .collect()
        } else {
            query.ordering.clone()
        };
        rows.sort_by(|a, b| compare_rows(a, b, &ordering));
        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|n| n as usize).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn fetch_one(&self, model: &Model, keys: &Row) -> Result<Option<Row>, RestError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(&table_key(model))
            .and_then(|t| t.rows.iter().find(|r| keys_match(r, keys)).cloned()))
    }

    async fn insert(&self, model: &Model, data: &Row) -> Result<Row, RestError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let table = tables.entry(table_key(model)).or_default();
        let mut row = Row::new();
        for column in &model.columns {
            let value = match data.get(&column.name) {
                Some(v) => {
                    if is_serial(column) {
                        if let Some(n) = v.as_i64() {
                            let next = table.serials.entry(column.name.clone()).or_insert(0);
                            *next = (*next).max(n);
                        }
                    }
                    v.clone()
                }
                None if is_serial(column) => {
                    let next = table.serials.entry(column.name.clone()).or_insert(0);
                    *next += 1;
                    Value::from(*next)
                }
                None => column_default(column),
            };
            check_not_null(column, &value)?;
            row.insert(column.name.clone(), value);
        }
        if table.rows.iter().any(|r| same_key(model, r, &row)) {
            return Err(RestError::Conflict(format!(
                "Duplicate key for {}: {}",
                model.table_name,
                key_repr(model, &row)
            )));
        }
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, model: &Model, keys: &Row, data: &Row) -> Result<Option<Row>, RestError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let Some(table) = tables.get_mut(&table_key(model)) else {
            return Ok(None);
        };
        let Some(index) = table.rows.iter().position(|r| keys_match(r, keys)) else {
            return Ok(None);
        };
        let mut updated = table.rows[index].clone();
        for column in &model.columns {
            if let Some(v) = data.get(&column.name) {
                check_not_null(column, v)?;
                updated.insert(column.name.clone(), v.clone());
            }
        }
        let clash = table
            .rows
            .iter()
            .enumerate()
            .any(|(i, r)| i != index && same_key(model, r, &updated));
        if clash {
            return Err(RestError::Conflict(format!(
                "Duplicate key for {}: {}",
                model.table_name,
                key_repr(model, &updated)
            )));
        }
        table.rows[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, model: &Model, keys: &Row) -> Result<Option<Row>, RestError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let Some(table) = tables.get_mut(&table_key(model)) else {
            return Ok(None);
        };
        Ok(table
            .rows
            .iter()
            .position(|r| keys_match(r, keys))
            .map(|i| table.rows.remove(i)))
    }
}

fn is_serial(column: &ColumnInfo) -> bool {
    column.kind == ColumnKind::Integer && column.has_default && column.default_sql.is_none()
}

/// Best-effort evaluation of simple column defaults.
fn column_default(column: &ColumnInfo) -> Value {
    let Some(sql) = column.default_sql.as_deref() else {
        return Value::Null;
    };
    let sql = sql.trim();
    match sql.to_lowercase().as_str() {
        "now()" | "current_timestamp" => return Value::String(chrono::Utc::now().to_rfc3339()),
        "current_date" => return Value::String(chrono::Utc::now().format("%Y-%m-%d").to_string()),
        "gen_random_uuid()" | "uuid_generate_v4()" => {
            return Value::String(uuid::Uuid::new_v4().to_string())
        }
        "null" => return Value::Null,
        _ => {}
    }
    if let Some(inner) = sql.strip_prefix('\'').and_then(|s| s.split("'::").next()) {
        return Value::String(inner.trim_end_matches('\'').replace("''", "'"));
    }
    serde_json::from_str(&sql.to_lowercase()).unwrap_or(Value::Null)
}

fn check_not_null(column: &ColumnInfo, value: &Value) -> Result<(), RestError> {
    if !column.nullable && value.is_null() {
        return Err(RestError::BadRequest(format!(
            "Null value in column {} violates not-null constraint",
            column.name
        )));
    }
    Ok(())
}

fn keys_match(row: &Row, keys: &Row) -> bool {
    keys.iter().all(|(k, v)| {
        row.get(k)
            .map(|rv| compare_values(rv, v) == Some(Ordering::Equal))
            .unwrap_or(false)
    })
}

fn same_key(model: &Model, a: &Row, b: &Row) -> bool {
    !model.pk_columns.is_empty()
        && model.pk_columns.iter().all(|c| match (a.get(c), b.get(c)) {
            (Some(x), Some(y)) => compare_values(x, y) == Some(Ordering::Equal),
            _ => false,
        })
}

fn key_repr(model: &Model, row: &Row) -> String {
    model
        .pk_columns
        .iter()
        .map(|c| format!("{}={}", c, row.get(c).unwrap_or(&Value::Null)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compare two non-null JSON scalars of compatible type.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        // Numeric columns may hold numbers or their text form.
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?),
        (Value::String(x), Value::Number(y)) => x.parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (x, y) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}

/// NULL is greater than any value, so it sorts last ascending and first descending.
fn compare_for_sort(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_values(a, b).unwrap_or(Ordering::Equal),
    }
}

fn compare_rows(a: &Row, b: &Row, ordering: &[OrderBy]) -> Ordering {
    for o in ordering {
        let x = a.get(&o.column).unwrap_or(&Value::Null);
        let y = b.get(&o.column).unwrap_or(&Value::Null);
        let ord = compare_for_sort(x, y);
        let ord = if o.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Translate a SQL LIKE pattern (`%`, `_`, backslash escape) to an anchored regex.
fn like_to_regex(pattern: &str, case_insensitive: bool) -> Result<regex::Regex, RestError> {
    let mut out = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    RegexBuilder::new(&out)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| RestError::BadRequest(format!("Invalid LIKE pattern {:?}: {}", pattern, e)))
}

enum Test<'a> {
    Cond(&'a Condition),
    Like { column: &'a str, regex: regex::Regex, negate: bool },
}

/// A filter compiled once per query (LIKE patterns become regexes).
struct Matcher<'a> {
    conjunction: Conjunction,
    tests: Vec<Test<'a>>,
}

impl<'a> Matcher<'a> {
    fn new(filter: Option<&'a Filter>) -> Result<Self, RestError> {
        let Some(filter) = filter else {
            return Ok(Matcher { conjunction: Conjunction::And, tests: Vec::new() });
        };
        let tests = filter
            .conditions
            .iter()
            .map(|c| match c.op {
                Operator::Like | Operator::NotLike | Operator::ILike | Operator::NotILike => {
                    let pattern = c.value.as_str().unwrap_or_default();
                    let insensitive = matches!(c.op, Operator::ILike | Operator::NotILike);
                    Ok(Test::Like {
                        column: &c.column,
                        regex: like_to_regex(pattern, insensitive)?,
                        negate: matches!(c.op, Operator::NotLike | Operator::NotILike),
                    })
                }
                _ => Ok(Test::Cond(c)),
            })
            .collect::<Result<Vec<_>, RestError>>()?;
        Ok(Matcher { conjunction: filter.conjunction, tests })
    }

    fn matches(&self, row: &Row) -> bool {
        if self.tests.is_empty() {
            return true;
        }
        let mut results = self.tests.iter().map(|t| evaluate(t, row));
        match self.conjunction {
            Conjunction::And => results.all(|r| r),
            Conjunction::Or => results.any(|r| r),
        }
    }
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn evaluate(test: &Test<'_>, row: &Row) -> bool {
    let cond = match test {
        Test::Like { column, regex, negate } => {
            return match row.get(*column) {
                None | Some(Value::Null) => false,
                Some(v) => regex.is_match(&as_text(v)) != *negate,
            };
        }
        Test::Cond(c) => c,
    };
    let value = row.get(&cond.column).unwrap_or(&Value::Null);
    let target = &cond.value;
    match cond.op {
        Operator::Eq if target.is_null() => value.is_null(),
        Operator::Ne if target.is_null() => !value.is_null(),
        Operator::Is | Operator::IsNot => {
            let is = match target {
                Value::Bool(b) => value.as_bool() == Some(*b),
                _ => value.is_null(),
            };
            is == (cond.op == Operator::Is)
        }
        Operator::NotIn if target.as_array().map(Vec::is_empty).unwrap_or(false) => true,
        _ if value.is_null() => false,
        Operator::In | Operator::NotIn => {
            let found = target
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .any(|i| compare_values(value, i) == Some(Ordering::Equal))
                })
                .unwrap_or(false);
            found == (cond.op == Operator::In)
        }
        op => match compare_values(value, target) {
            None => false,
            Some(ord) => match op {
                Operator::Eq => ord == Ordering::Equal,
                Operator::Ne => ord != Ordering::Equal,
                Operator::Lt => ord == Ordering::Less,
                Operator::Le => ord != Ordering::Greater,
                Operator::Gt => ord == Ordering::Greater,
                Operator::Ge => ord != Ordering::Less,
                _ => false,
            },
        },
    }
}
