//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resolved model and a [`Query`].

use crate::config::{ColumnInfo, ColumnKind, Model};
use crate::query::{Condition, Conjunction, Filter, Operator, OrderBy, Query};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(model: &Model) -> String {
    format!("{}.{}", quoted(&model.schema_name), quoted(&model.table_name))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// `$n::type` for a value bound against `column`.
    fn placeholder(&mut self, column: &ColumnInfo, v: Value) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, column.pg_type)
    }
}

/// SELECT list: custom enum (schema.typename) and numeric columns as `col::text` so rows decode as strings.
fn select_column_list(model: &Model) -> String {
    model
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            if c.pg_type.contains('.') || c.kind == ColumnKind::Numeric {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn condition_sql(q: &mut QueryBuf, model: &Model, cond: &Condition) -> String {
    let col = quoted(&cond.column);
    let Some(info) = model.column(&cond.column) else {
        // Conditions are validated against the model when parsed.
        return "FALSE".to_string();
    };
    match cond.op {
        Operator::Eq | Operator::Ne if cond.value.is_null() => {
            let neg = if cond.op == Operator::Ne { " NOT" } else { "" };
            format!("{} IS{} NULL", col, neg)
        }
        Operator::Eq
        | Operator::Ne
        | Operator::Lt
        | Operator::Le
        | Operator::Gt
        | Operator::Ge => {
            let ph = q.placeholder(info, cond.value.clone());
            let op = if cond.op == Operator::Ne { "<>" } else { cond.op.as_str() };
            format!("{} {} {}", col, op, ph)
        }
        Operator::In | Operator::NotIn => {
            let items = cond.value.as_array().map(Vec::as_slice).unwrap_or(&[]);
            let not_in = cond.op == Operator::NotIn;
            if items.is_empty() {
                return if not_in { "TRUE" } else { "FALSE" }.to_string();
            }
            let placeholders: Vec<String> =
                items.iter().map(|v| q.placeholder(info, v.clone())).collect();
            format!(
                "{} {} ({})",
                col,
                if not_in { "NOT IN" } else { "IN" },
                placeholders.join(", ")
            )
        }
        Operator::Like | Operator::NotLike | Operator::ILike | Operator::NotILike => {
            let n = q.push_param(cond.value.clone());
            format!("{}::text {} ${}::text", col, cond.op.as_str().to_uppercase(), n)
        }
        Operator::Is | Operator::IsNot => {
            let rhs = match cond.value {
                Value::Bool(true) => "TRUE",
                Value::Bool(false) => "FALSE",
                _ => "NULL",
            };
            format!("{} {} {}", col, cond.op.as_str().to_uppercase(), rhs)
        }
    }
}

fn where_clause(q: &mut QueryBuf, model: &Model, filter: Option<&Filter>) -> String {
    let Some(filter) = filter else {
        return String::new();
    };
    if filter.conditions.is_empty() {
        return String::new();
    }
    let joiner = match filter.conjunction {
        Conjunction::And => " AND ",
        Conjunction::Or => " OR ",
    };
    let parts: Vec<String> = filter
        .conditions
        .iter()
        .map(|c| condition_sql(q, model, c))
        .collect();
    format!(" WHERE {}", parts.join(joiner))
}

fn keys_clause(q: &mut QueryBuf, model: &Model, keys: &Map<String, Value>) -> String {
    let conditions = keys
        .iter()
        .map(|(k, v)| Condition {
            column: k.clone(),
            op: Operator::Eq,
            value: v.clone(),
        })
        .collect();
    let filter = Filter {
        conjunction: Conjunction::And,
        conditions,
    };
    where_clause(q, model, Some(&filter))
}

/// ORDER BY the requested columns, falling back to the primary key for stable pages.
fn order_clause(model: &Model, ordering: &[OrderBy]) -> String {
    let parts: Vec<String> = if ordering.is_empty() {
        model.pk_columns.iter().map(|c| quoted(c)).collect()
    } else {
        ordering
            .iter()
            .map(|o| format!("{} {}", quoted(&o.column), if o.descending { "DESC" } else { "ASC" }))
            .collect()
    };
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", parts.join(", "))
    }
}

/// SELECT with WHERE from the query's filter, ORDER BY, LIMIT and OFFSET.
pub fn select_list(model: &Model, query: &Query) -> QueryBuf {
    let mut q = QueryBuf::default();
    let where_sql = where_clause(&mut q, model, query.filter.as_ref());
    let limit = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(model),
        qualified_table(model),
        where_sql,
        order_clause(model, &query.ordering),
        limit,
        offset
    );
    q
}

pub fn count(model: &Model, filter: Option<&Filter>) -> QueryBuf {
    let mut q = QueryBuf::default();
    let where_sql = where_clause(&mut q, model, filter);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", qualified_table(model), where_sql);
    q
}

/// SELECT the row identified by `keys` (column → value, usually the primary key).
pub fn select_by_keys(model: &Model, keys: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::default();
    let where_sql = keys_clause(&mut q, model, keys);
    q.sql = format!(
        "SELECT {} FROM {}{} LIMIT 1",
        select_column_list(model),
        qualified_table(model),
        where_sql
    );
    q
}

/// INSERT the given columns (model order); columns left out take their DB default.
pub fn insert(model: &Model, data: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::default();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &model.columns {
        let Some(val) = data.get(&c.name) else { continue };
        placeholders.push(q.placeholder(c, val.clone()));
        cols.push(quoted(&c.name));
    }
    let table = qualified_table(model);
    let returning = select_column_list(model);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE the row identified by `keys`: SET only columns present in `data`.
/// With nothing to set this degrades to a SELECT of the same row.
pub fn update_by_keys(
    model: &Model,
    keys: &Map<String, Value>,
    data: &Map<String, Value>,
) -> QueryBuf {
    let mut q = QueryBuf::default();
    let mut sets = Vec::new();
    for c in &model.columns {
        let Some(val) = data.get(&c.name) else { continue };
        let rhs = q.placeholder(c, val.clone());
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
    }
    if sets.is_empty() {
        return select_by_keys(model, keys);
    }
    let where_sql = keys_clause(&mut q, model, keys);
    q.sql = format!(
        "UPDATE {} SET {}{} RETURNING {}",
        qualified_table(model),
        sets.join(", "),
        where_sql,
        select_column_list(model)
    );
    q
}

pub fn delete_by_keys(model: &Model, keys: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::default();
    let where_sql = keys_clause(&mut q, model, keys);
    q.sql = format!(
        "DELETE FROM {}{} RETURNING {}",
        qualified_table(model),
        where_sql,
        select_column_list(model)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> Model {
        let col = |name: &str, ty: &str| ColumnInfo {
            name: name.into(),
            kind: ColumnKind::from_type_name(ty),
            pg_type: ty.into(),
            ddl_type: ty.into(),
            nullable: true,
            has_default: false,
            default_sql: None,
        };
        Model {
            id: "thing".into(),
            schema_name: "public".into(),
            table_name: "things".into(),
            pk_columns: vec!["id".into()],
            columns: vec![col("id", "int4"), col("value", "text"), col("price", "numeric")],
        }
    }

    fn keys(id: i64) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("id".into(), json!(id));
        m
    }

    #[test]
    fn select_list_with_filter_order_and_page() {
        let query = Query {
            filter: Some(Filter {
                conjunction: Conjunction::Or,
                conditions: vec![
                    Condition { column: "id".into(), op: Operator::In, value: json!([1, 2]) },
                    Condition { column: "value".into(), op: Operator::ILike, value: json!("o%") },
                    Condition { column: "value".into(), op: Operator::IsNot, value: json!(null) },
                ],
            }),
            ordering: vec![OrderBy { column: "value".into(), descending: true }],
            limit: Some(10),
            offset: Some(20),
        };
        let q = select_list(&model(), &query);
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"value\", \"price\"::text AS \"price\" FROM \"public\".\"things\" \
             WHERE \"id\" IN ($1::int4, $2::int4) OR \"value\"::text ILIKE $3::text \
             OR \"value\" IS NOT NULL ORDER BY \"value\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(q.params, vec![json!(1), json!(2), json!("o%")]);
    }

    #[test]
    fn default_order_is_primary_key() {
        let q = select_list(&model(), &Query::default());
        assert!(q.sql.ends_with("FROM \"public\".\"things\" ORDER BY \"id\""));
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let filter = Filter {
            conjunction: Conjunction::And,
            conditions: vec![Condition { column: "id".into(), op: Operator::In, value: json!([]) }],
        };
        let q = count(&model(), Some(&filter));
        assert_eq!(q.sql, "SELECT COUNT(*) FROM \"public\".\"things\" WHERE FALSE");
        assert!(q.params.is_empty());
    }

    #[test]
    fn equality_with_null_uses_is_null() {
        let filter = Filter {
            conjunction: Conjunction::And,
            conditions: vec![Condition { column: "value".into(), op: Operator::Ne, value: json!(null) }],
        };
        let q = count(&model(), Some(&filter));
        assert!(q.sql.ends_with("WHERE \"value\" IS NOT NULL"));
    }

    #[test]
    fn insert_only_given_columns() {
        let mut data = Map::new();
        data.insert("value".into(), json!("one"));
        let q = insert(&model(), &data);
        assert!(q.sql.starts_with("INSERT INTO \"public\".\"things\" (\"value\") VALUES ($1::text) RETURNING"));
        assert_eq!(q.params, vec![json!("one")]);

        let q = insert(&model(), &Map::new());
        assert!(q.sql.contains("DEFAULT VALUES"));
    }

    #[test]
    fn update_binds_sets_before_keys() {
        let mut data = Map::new();
        data.insert("value".into(), json!("two"));
        let q = update_by_keys(&model(), &keys(2), &data);
        assert!(q.sql.starts_with(
            "UPDATE \"public\".\"things\" SET \"value\" = $1::text WHERE \"id\" = $2::int4 RETURNING"
        ));
        assert_eq!(q.params, vec![json!("two"), json!(2)]);

        let q = update_by_keys(&model(), &keys(2), &Map::new());
        assert!(q.sql.starts_with("SELECT"));
    }

    #[test]
    fn delete_returns_row() {
        let q = delete_by_keys(&model(), &keys(3));
        assert!(q.sql.starts_with("DELETE FROM \"public\".\"things\" WHERE \"id\" = $1::int4 RETURNING"));
    }

    #[test]
    fn casts_ignore_type_modifiers() {
        let config = crate::config::load_from_str(
            r#"{
                "models": [{
                    "id": "tag",
                    "table": "tags",
                    "primary_key": "name",
                    "columns": [
                        {"name": "name", "type": {"name": "varchar", "params": [8]}},
                        {"name": "weight", "type": {"name": "numeric", "params": [4, 1]}}
                    ]
                }],
                "resources": []
            }"#,
        )
        .unwrap();
        let resolved = crate::config::resolve(&config).unwrap();
        let model = resolved.model("tag").unwrap();
        let mut data = Map::new();
        data.insert("name".into(), json!("a-long-name"));
        data.insert("weight".into(), json!("1.25"));
        let q = insert(model, &data);
        assert!(q.sql.contains("VALUES ($1::varchar, $2::numeric)"), "{}", q.sql);
    }
}
