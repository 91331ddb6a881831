//! Library-wide settings: defaults applied to every resource registration.

use crate::acl::Acl;
use crate::error::ConfigError;
use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Verbs considered resource methods, lower case. A view method outside this list is not routed.
pub const DEFAULT_RESOURCE_METHODS: &[&str] = &["delete", "get", "options", "patch", "post", "put"];

/// Default request body limit (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// ACL for resources that declare none.
    #[serde(default)]
    pub default_acl: Option<Acl>,
    #[serde(default = "default_resource_methods")]
    pub resource_methods: Vec<String>,
    /// Fields returned when a request names none.
    #[serde(default)]
    pub default_response_fields: Option<Vec<String>>,
    /// Form/JSON field holding the CSRF token; stripped from extracted data.
    #[serde(default)]
    pub csrf_token_name: Option<String>,
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

fn default_resource_methods() -> Vec<String> {
    DEFAULT_RESOURCE_METHODS.iter().map(|m| m.to_string()).collect()
}

fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_acl: None,
            resource_methods: default_resource_methods(),
            default_response_fields: None,
            csrf_token_name: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Settings {
    /// Settings from `RESTLER_*` environment variables (a `.env` file is honoured).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Settings::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        if let Some(acl) = lookup("RESTLER_DEFAULT_ACL") {
            let acl: Acl = serde_json::from_str(&acl)
                .map_err(|e| ConfigError::Load(format!("RESTLER_DEFAULT_ACL: {}", e)))?;
            settings.default_acl = Some(acl);
        }
        if let Some(methods) = lookup("RESTLER_RESOURCE_METHODS") {
            settings.resource_methods = split_list(&methods);
        }
        if let Some(fields) = lookup("RESTLER_DEFAULT_RESPONSE_FIELDS") {
            settings.default_response_fields = Some(split_list(&fields));
        }
        if let Some(name) = lookup("RESTLER_CSRF_TOKEN_NAME") {
            let name = name.trim().to_string();
            if !name.is_empty() {
                settings.csrf_token_name = Some(name);
            }
        }
        if let Some(limit) = lookup("RESTLER_BODY_LIMIT") {
            settings.body_limit = limit
                .trim()
                .parse()
                .map_err(|e| ConfigError::Load(format!("RESTLER_BODY_LIMIT: {}", e)))?;
        }
        Ok(settings)
    }

    /// Resource methods as HTTP methods, in configured order.
    pub fn resource_methods(&self) -> Result<Vec<Method>, ConfigError> {
        self.resource_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_uppercase().as_bytes())
                    .map_err(|_| ConfigError::Validation(format!("invalid resource method: {}", m)))
            })
            .collect()
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert!(settings.default_acl.is_none());
        assert_eq!(
            settings.resource_methods().unwrap(),
            vec![Method::DELETE, Method::GET, Method::OPTIONS, Method::PATCH, Method::POST, Method::PUT]
        );
        assert_eq!(settings.body_limit, DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn reads_variables() {
        let settings = Settings::from_lookup(lookup(&[
            ("RESTLER_DEFAULT_ACL", r#"[["Allow", "system.Everyone", "view"]]"#),
            ("RESTLER_RESOURCE_METHODS", "GET, post"),
            ("RESTLER_DEFAULT_RESPONSE_FIELDS", "id,value"),
            ("RESTLER_CSRF_TOKEN_NAME", "csrf_token"),
            ("RESTLER_BODY_LIMIT", "1024"),
        ]))
        .unwrap();
        assert_eq!(settings.default_acl.unwrap().0.len(), 1);
        assert_eq!(settings.resource_methods, vec!["get", "post"]);
        assert_eq!(settings.default_response_fields.unwrap(), vec!["id", "value"]);
        assert_eq!(settings.csrf_token_name.as_deref(), Some("csrf_token"));
        assert_eq!(settings.body_limit, 1024);
    }

    #[test]
    fn rejects_bad_acl() {
        let err = Settings::from_lookup(lookup(&[("RESTLER_DEFAULT_ACL", "nope")])).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn deserializes_with_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"csrf_token_name": "token"}"#).unwrap();
        assert_eq!(settings.resource_methods.len(), 6);
        assert_eq!(settings.body_limit, DEFAULT_BODY_LIMIT);
    }
}
