//! Views sit between the router and a resource: they pick the resource method for the
//! request and shape its result into the standard response.

use crate::error::RestError;
use crate::request::ResourceRequest;
use crate::resource::{Resource, ResourceConfig};
use crate::response::{Reply, ResourceResult};
use async_trait::async_trait;
use axum::http::Method;

#[async_trait]
pub trait ResourceView: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Verbs this view serves. HEAD is implied by GET.
    fn methods(&self) -> Vec<Method>;

    /// Per-verb view arguments.
    fn view_config(&self, _method: &Method) -> Option<ResourceConfig> {
        None
    }

    /// Call the resource for the request's method. `Ok(None)` becomes 204 No Content.
    async fn dispatch(&self, resource: &dyn Resource, req: &ResourceRequest) -> ResourceResult;
}

/// Run the resource's response converter over a reply with content.
pub fn standard_response(
    resource: &dyn Resource,
    req: &ResourceRequest,
    result: Option<Reply>,
) -> ResourceResult {
    match result {
        Some(reply) => Ok(Some(resource.response_converter(req, reply)?)),
        None => Ok(None),
    }
}

/// Serves DELETE, GET, PATCH, POST and PUT by calling the same-named resource method.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultView;

#[async_trait]
impl ResourceView for DefaultView {
    fn name(&self) -> &str {
        "DefaultView"
    }

    fn methods(&self) -> Vec<Method> {
        vec![Method::DELETE, Method::GET, Method::PATCH, Method::POST, Method::PUT]
    }

    async fn dispatch(&self, resource: &dyn Resource, req: &ResourceRequest) -> ResourceResult {
        let method = req.method().clone();
        let result = match method {
            Method::GET => resource.get(req).await?,
            Method::HEAD => resource.head(req).await?,
            Method::POST => resource.post(req).await?,
            Method::PUT => resource.put(req).await?,
            Method::PATCH => resource.patch(req).await?,
            Method::DELETE => resource.delete(req).await?,
            other => return Err(RestError::method_not_allowed(&other)),
        };
        standard_response(resource, req, result)
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

    struct Things;

    #[async_trait]
    impl Resource for Things {
        async fn get(&self, _req: &ResourceRequest) -> ResourceResult {
            Ok(Some(Reply::ok(json!({"items": []}))))
        }

        async fn delete(&self, _req: &ResourceRequest) -> ResourceResult {
            Ok(None)
        }

        fn response_converter(&self, _req: &ResourceRequest, mut reply: Reply) -> Result<Reply, RestError> {
            reply.body["converted"] = json!(true);
            Ok(reply)
        }
    }

    fn request(method: Method) -> ResourceRequest {
        let state = AppState::new(Arc::new(MemoryStore::new()), Settings::default());
        ResourceRequest::new(method, Uri::from_static("/things"), state).unwrap()
    }

    #[tokio::test]
    async fn converts_replies_with_content() {
        let reply = DefaultView.dispatch(&Things, &request(Method::GET)).await.unwrap().unwrap();
        assert_eq!(reply.body["converted"], true);
    }

    #[tokio::test]
    async fn none_means_no_content() {
        let reply = DefaultView.dispatch(&Things, &request(Method::DELETE)).await.unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn unknown_verbs_are_not_allowed() {
        let err = DefaultView.dispatch(&Things, &request(Method::OPTIONS)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        let err = DefaultView.dispatch(&Things, &request(Method::PUT)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
