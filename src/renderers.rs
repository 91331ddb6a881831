//! Renderers turn resource replies into response bodies; the Accept header or a URL
//! extension picks one.

use crate::error::{ConfigError, RestError};
use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub trait Renderer: Send + Sync + 'static {
    fn media_type(&self) -> &str;

    fn render(&self, value: &Value) -> Result<Response, RestError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn media_type(&self) -> &str {
        "application/json"
    }

    fn render(&self, value: &Value) -> Result<Response, RestError> {
        Ok(Json(value).into_response())
    }
}

/// Renders a list of objects as CSV with a humanised header row.
///
/// The rows are the value itself when it is an array, else the first array found among
/// the values of an object (so `{"items": [...], "pagination_data": {...}}` renders its items).
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvRenderer;

impl CsvRenderer {
    fn rows(value: &Value) -> &[Value] {
        match value {
            Value::Array(items) => items,
            Value::Object(map) => map
                .values()
                .find_map(|v| v.as_array())
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            _ => &[],
        }
    }

    fn cell(value: Option<&Value>) -> String {
        match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// "first_name" -> "First name".
pub fn humanize(field: &str) -> String {
    let spaced = field.split('_').collect::<Vec<_>>().join(" ").to_lowercase();
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Renderer for CsvRenderer {
    fn media_type(&self) -> &str {
        "text/csv"
    }

    fn render(&self, value: &Value) -> Result<Response, RestError> {
        let rows = Self::rows(value);
        let mut body = Vec::new();
        if let Some(first) = rows.first().and_then(Value::as_object) {
            let fields: Vec<&String> = first.keys().collect();
            let mut writer = csv::Writer::from_writer(&mut body);
            let csv_err = |e: csv::Error| RestError::Internal(format!("csv: {}", e));
            writer
                .write_record(fields.iter().map(|f| humanize(f)))
                .map_err(csv_err)?;
            for row in rows {
                let Some(row) = row.as_object() else { continue };
                writer
                    .write_record(fields.iter().map(|f| Self::cell(row.get(*f))))
                    .map_err(csv_err)?;
            }
            writer
                .flush()
                .map_err(|e| RestError::Internal(format!("csv: {}", e)))?;
        }
        Ok((
            [(header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"))],
            body,
        )
            .into_response())
    }
}

/// URL extensions for renderer names whose file extension differs from the output format.
const RENDERER_EXT_MAP: &[(&str, &str)] = &[("jinja2", "html"), ("mako", "html")];

const RENDERER_ACCEPT_MAP: &[(&str, &str)] = &[
    ("json", "application/json"),
    ("csv", "text/csv"),
    ("html", "text/html"),
];

/// Extension and media type for a renderer name. `templates/thing.jinja2` -> (`html`, `text/html`).
pub fn ext_and_accept(renderer: &str) -> (String, Option<&'static str>) {
    let ext = renderer.rsplit_once('.').map(|(_, e)| e).unwrap_or(renderer);
    let ext = RENDERER_EXT_MAP
        .iter()
        .find(|(k, _)| *k == ext)
        .map(|(_, v)| *v)
        .unwrap_or(ext);
    let accept = RENDERER_ACCEPT_MAP
        .iter()
        .find(|(k, _)| *k == ext)
        .map(|(_, v)| *v);
    (ext.to_string(), accept)
}

/// Renderers by name. `json` and `csv` are registered by default.
#[derive(Clone)]
pub struct RendererRegistry {
    by_name: HashMap<String, Arc<dyn Renderer>>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        let mut by_name: HashMap<String, Arc<dyn Renderer>> = HashMap::new();
        by_name.insert("json".into(), Arc::new(JsonRenderer));
        by_name.insert("csv".into(), Arc::new(CsvRenderer));
        RendererRegistry { by_name }
    }
}

impl RendererRegistry {
    pub fn add(&mut self, name: impl Into<String>, renderer: Arc<dyn Renderer>) {
        self.by_name.insert(name.into(), renderer);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Renderer>, ConfigError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownRenderer(name.to_string()))
    }
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("RendererRegistry").field("names", &names).finish()
    }
}

struct MediaRange {
    type_: String,
    subtype: String,
    q: f32,
}

impl MediaRange {
    /// 2 for an exact match, 1 for `type/*`, 0 for `*/*`.
    fn specificity(&self, offer: &mime::Mime) -> Option<u8> {
        if self.type_ == "*" {
            return Some(0);
        }
        if self.type_ != offer.type_().as_str() {
            return None;
        }
        if self.subtype == "*" {
            return Some(1);
        }
        (self.subtype == offer.subtype().as_str()).then_some(2)
    }
}

fn parse_accept(header: &str) -> Vec<MediaRange> {
    header
        .split(',')
        .filter_map(|item| item.trim().parse::<mime::Mime>().ok())
        .map(|m| {
            let q = m
                .get_param("q")
                .and_then(|q| q.as_str().parse::<f32>().ok())
                .unwrap_or(1.0)
                .clamp(0.0, 1.0);
            MediaRange {
                type_: m.type_().as_str().to_lowercase(),
                subtype: m.subtype().as_str().to_lowercase(),
                q,
            }
        })
        .collect()
}

/// Index of the offer the client prefers; `None` when nothing offered is acceptable.
///
/// A missing or unparsable header accepts anything, so the first offer wins. Among offers
/// with equal quality the earlier one wins.
pub fn negotiate(accept: Option<&str>, offers: &[&str]) -> Option<usize> {
    if offers.is_empty() {
        return None;
    }
    let ranges = accept.map(parse_accept).unwrap_or_default();
    if ranges.is_empty() {
        return Some(0);
    }
    let mut best: Option<(usize, f32)> = None;
    for (i, offer) in offers.iter().enumerate() {
        let Ok(offer) = offer.parse::<mime::Mime>() else { continue };
        let q = ranges
            .iter()
            .filter_map(|r| r.specificity(&offer).map(|s| (s, r.q)))
            .max_by_key(|(s, _)| *s)
            .map(|(_, q)| q)
            .unwrap_or(0.0);
        if q > 0.0 && best.map(|(_, bq)| q > bq).unwrap_or(true) {
            best = Some((i, q));
        }
    }
    best.map(|(i, _)| i)
}
