//! Query-string parameters: a multi-valued map plus typed extraction that answers bad input with 400.

use crate::error::RestError;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Pair {
    name: String,
    value: String,
}

/// Multi-valued query parameters in request order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<Pair>,
}

impl QueryParams {
    pub fn parse(query: &str) -> Result<Self, RestError> {
        let decoded: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| RestError::BadRequest(format!("Malformed query string: {}", e)))?;
        Ok(QueryParams {
            pairs: decoded.into_iter().map(|(name, value)| Pair { name, value }).collect(),
        })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        QueryParams {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| Pair {
                    name: k.into(),
                    value: v.into(),
                })
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|p| p.name == name)
    }

    /// Last value for `name`, as a multi-dict lookup would return it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|p| p.name == name)
            .map(|p| p.value.as_str())
            .collect()
    }

    /// Remove every value for `name`; returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.pairs.len();
        self.pairs.retain(|p| p.name != name);
        before != self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|p| (p.name.as_str(), p.value.as_str()))
    }

    pub fn to_query_string(&self) -> String {
        let pairs: Vec<(&str, &str)> = self.iter().collect();
        serde_urlencoded::to_string(pairs).unwrap_or_default()
    }
}

/// Conversion from a single (already stripped, non-empty) parameter value.
pub trait FromParam: Sized {
    /// Name used in parse error details.
    const KIND: &'static str;

    fn from_param(s: &str) -> Result<Self, String>;
}

impl FromParam for String {
    const KIND: &'static str = "str";

    fn from_param(s: &str) -> Result<Self, String> {
        Ok(s.to_string())
    }
}

impl FromParam for i64 {
    const KIND: &'static str = "int";

    fn from_param(s: &str) -> Result<Self, String> {
        s.parse().map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

impl FromParam for u64 {
    const KIND: &'static str = "int";

    fn from_param(s: &str) -> Result<Self, String> {
        s.parse().map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

impl FromParam for bool {
    const KIND: &'static str = "bool";

    fn from_param(s: &str) -> Result<Self, String> {
        as_bool(s)
    }
}

impl FromParam for Vec<String> {
    const KIND: &'static str = "list";

    fn from_param(s: &str) -> Result<Self, String> {
        Ok(as_list(s))
    }
}

impl FromParam for Value {
    const KIND: &'static str = "json";

    fn from_param(s: &str) -> Result<Self, String> {
        serde_json::from_str(s).map_err(|e| e.to_string())
    }
}

/// How raw values are cleaned before conversion.
#[derive(Clone, Copy, Debug)]
pub struct ParamOptions {
    pub strip: bool,
    pub convert_empty_to_none: bool,
}

impl Default for ParamOptions {
    fn default() -> Self {
        ParamOptions {
            strip: true,
            convert_empty_to_none: true,
        }
    }
}

fn convert<T: FromParam>(name: &str, raw: &str, opts: ParamOptions) -> Result<Option<T>, RestError> {
    let v = if opts.strip { raw.trim() } else { raw };
    if v.is_empty() && opts.convert_empty_to_none {
        return Ok(None);
    }
    T::from_param(v).map(Some).map_err(|_| {
        RestError::BadRequest(format!(
            "Could not parse parameter {} with {}: {:?}",
            name,
            T::KIND,
            v
        ))
    })
}

/// Single parameter. `Ok(None)` when absent or blank; 400 when it cannot be converted.
pub fn get_param<T: FromParam>(params: &QueryParams, name: &str) -> Result<Option<T>, RestError> {
    get_param_with(params, name, ParamOptions::default())
}

pub fn get_param_with<T: FromParam>(
    params: &QueryParams,
    name: &str,
    opts: ParamOptions,
) -> Result<Option<T>, RestError> {
    match params.get(name) {
        Some(raw) => convert(name, raw, opts),
        None => Ok(None),
    }
}

/// Every value of a repeated parameter, blanks dropped.
pub fn get_params<T: FromParam>(params: &QueryParams, name: &str) -> Result<Vec<T>, RestError> {
    let opts = ParamOptions::default();
    let mut out = Vec::new();
    for raw in params.get_all(name) {
        if let Some(v) = convert(name, raw, opts)? {
            out.push(v);
        }
    }
    Ok(out)
}

/// Only "1", "true", "0" and "false" (any case) are accepted.
pub fn as_bool(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(r#"Expected value to be one of "1", "true", "0", or "false""#.to_string()),
    }
}

/// Comma-separated list, items stripped.
pub fn as_list(s: &str) -> Vec<String> {
    s.trim().split(',').map(|item| item.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_values_keep_order() {
        let params = QueryParams::parse("ordering=a&ordering=-b&page=2").unwrap();
        assert_eq!(params.get_all("ordering"), vec!["a", "-b"]);
        assert_eq!(params.get("ordering"), Some("-b"));
        assert!(!params.contains("fields"));
    }

    #[test]
    fn decodes_percent_escapes() {
        let params = QueryParams::parse("filters=%7B%22value%20like%22%3A%22o%25%22%7D").unwrap();
        assert_eq!(params.get("filters"), Some(r#"{"value like":"o%"}"#));
    }

    #[test]
    fn converts_and_rejects() {
        let params = QueryParams::parse("page=3&page_size=abc&blank=%20").unwrap();
        assert_eq!(get_param::<i64>(&params, "page").unwrap(), Some(3));
        assert_eq!(get_param::<i64>(&params, "missing").unwrap(), None);
        assert_eq!(get_param::<String>(&params, "blank").unwrap(), None);
        match get_param::<i64>(&params, "page_size") {
            Err(RestError::BadRequest(msg)) => {
                assert_eq!(msg, r#"Could not parse parameter page_size with int: "abc""#)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn keeps_blank_values_when_asked() {
        let params = QueryParams::parse("q=%20x%20").unwrap();
        let opts = ParamOptions {
            strip: false,
            convert_empty_to_none: false,
        };
        assert_eq!(get_param_with::<String>(&params, "q", opts).unwrap().as_deref(), Some(" x "));
    }

    #[test]
    fn lists_and_json() {
        let params = QueryParams::parse("fields=id,%20value&filters=%7B%22id%22%3A1%7D").unwrap();
        assert_eq!(
            get_param::<Vec<String>>(&params, "fields").unwrap(),
            Some(vec!["id".to_string(), "value".to_string()])
        );
        let filters = get_param::<Value>(&params, "filters").unwrap().unwrap();
        assert_eq!(filters["id"], 1);
    }

    #[test]
    fn multi_drops_blanks() {
        let params = QueryParams::parse("fields=id&fields=&fields=value").unwrap();
        assert_eq!(get_params::<String>(&params, "fields").unwrap(), vec!["id", "value"]);
    }

    #[test]
    fn bool_values() {
        assert_eq!(as_bool("TRUE"), Ok(true));
        assert_eq!(as_bool("0"), Ok(false));
        assert!(as_bool("yes").is_err());
    }

    #[test]
    fn remove_and_serialize() {
        let mut params = QueryParams::parse("$method=PUT&x=1").unwrap();
        assert!(params.remove("$method"));
        assert!(!params.remove("$method"));
        assert_eq!(params.to_query_string(), "x=1");
    }
}
