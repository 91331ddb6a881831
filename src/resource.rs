//! The `Resource` trait: one async method per HTTP verb.

use crate::acl::Acl;
use crate::error::RestError;
use crate::request::ResourceRequest;
use crate::response::{Reply, ResourceResult};
use async_trait::async_trait;
use axum::http::Method;

/// View arguments attached to a single verb of a resource or view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Permission required for this verb, replacing the registration's permission.
    pub permission: Option<String>,
    /// `Cache-Control: max-age` for this verb.
    pub http_cache: Option<u32>,
}

impl ResourceConfig {
    pub fn permission(permission: impl Into<String>) -> Self {
        ResourceConfig {
            permission: Some(permission.into()),
            http_cache: None,
        }
    }

    pub fn with_http_cache(mut self, seconds: u32) -> Self {
        self.http_cache = Some(seconds);
        self
    }

    /// Fields set on `other` win.
    pub fn merged_with(&self, other: &ResourceConfig) -> ResourceConfig {
        ResourceConfig {
            permission: other.permission.clone().or_else(|| self.permission.clone()),
            http_cache: other.http_cache.or(self.http_cache),
        }
    }
}

/// A REST resource. Every verb answers 405 unless implemented; HEAD runs GET.
///
/// One value serves every request to its routes, so per-request state lives in the
/// [`ResourceRequest`].
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    async fn get(&self, _req: &ResourceRequest) -> ResourceResult {
        Err(RestError::method_not_allowed(&Method::GET))
    }

    async fn post(&self, _req: &ResourceRequest) -> ResourceResult {
        Err(RestError::method_not_allowed(&Method::POST))
    }

    async fn put(&self, _req: &ResourceRequest) -> ResourceResult {
        Err(RestError::method_not_allowed(&Method::PUT))
    }

    async fn patch(&self, _req: &ResourceRequest) -> ResourceResult {
        Err(RestError::method_not_allowed(&Method::PATCH))
    }

    async fn delete(&self, _req: &ResourceRequest) -> ResourceResult {
        Err(RestError::method_not_allowed(&Method::DELETE))
    }

    async fn head(&self, req: &ResourceRequest) -> ResourceResult {
        self.get(req).await
    }

    /// ACL guarding the resource's views.
    fn acl(&self) -> Option<Acl> {
        None
    }

    /// Hook applied to every reply that has content, before rendering.
    fn response_converter(&self, _req: &ResourceRequest, reply: Reply) -> Result<Reply, RestError> {
        Ok(reply)
    }

    /// Route name used when the registration does not give one.
    fn default_name(&self) -> Option<String> {
        None
    }

    /// URL path used when the registration does not give one.
    fn default_path(&self) -> Option<String> {
        None
    }

    fn resource_config(&self, _method: &Method) -> Option<ResourceConfig> {
        None
    }

    /// Verbs this resource implements, reported in `Allow` when one of the others is
    /// called. `None` reports every verb the route serves except the rejected one.
    fn implemented_methods(&self) -> Option<Vec<Method>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::state::AppState;
    use crate::store::MemoryStore;
    use axum::http::{StatusCode, Uri};
    use serde_json::json;
    use std::sync::Arc;

    struct Hello;

    #[async_trait]
    impl Resource for Hello {
        async fn get(&self, _req: &ResourceRequest) -> ResourceResult {
            Ok(Some(Reply::ok(json!({"hello": "world"}))))
        }
    }

    fn request(method: Method) -> ResourceRequest {
        let state = AppState::new(Arc::new(MemoryStore::new()), Settings::default());
        ResourceRequest::new(method, Uri::from_static("/hello"), state).unwrap()
    }

    #[tokio::test]
    async fn unimplemented_verbs_are_not_allowed() {
        let err = Hello.post(&request(Method::POST)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        let err = Hello.delete(&request(Method::DELETE)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn head_runs_get() {
        let reply = Hello.head(&request(Method::HEAD)).await.unwrap().unwrap();
        assert_eq!(reply.body["hello"], "world");
    }

    #[test]
    fn config_merge() {
        let base = ResourceConfig::permission("view").with_http_cache(0);
        let verb = ResourceConfig::permission("edit");
        assert_eq!(
            base.merged_with(&verb),
            ResourceConfig {
                permission: Some("edit".into()),
                http_cache: Some(0)
            }
        );
    }
}
