//! Resource registration and the dispatcher that serves registered routes.
//!
//! `add_resource` turns one resource into a family of routes: one per renderer with the
//! renderer's extension appended (`/things.json`, `/things.csv`) and one bare route
//! (`/things`) negotiated through the Accept header. Every route gets one view per verb
//! and renderer. `into_router` packs the table into an axum `Router` whose fallback
//! matches routes in registration order.

use crate::acl::{authorize, Acl, EffectivePrincipals};
use crate::case::{join_path, path_from_name, type_route_name};
use crate::config::{resolve, ApiResourceConfig, ResolvedModels, ResourceKind, RestlerConfig};
use crate::error::{ConfigError, RestError};
use crate::middleware::{cors, tunneling};
use crate::orm::{ContainerResource, ItemResource};
use crate::renderers::{ext_and_accept, negotiate, Renderer, RendererRegistry};
use crate::request::{RequestContext, ResourceRequest};
use crate::resource::{Resource, ResourceConfig};
use crate::response::{no_content, render_reply, set_cache_control, strip_body};
use crate::routing::{RoutePattern, RouteUrls};
use crate::settings::Settings;
use crate::state::AppState;
use crate::store::Store;
use crate::view::{DefaultView, ResourceView};
use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    Router,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Per-registration options. Unset fields fall back to the resource's own defaults and
/// then to the settings.
#[derive(Clone, Default)]
pub struct ResourceOptions {
    pub name: Option<String>,
    pub acl: Option<Acl>,
    pub path: Option<String>,
    pub path_prefix: Option<String>,
    pub id_field: Option<String>,
    pub view: Option<Arc<dyn ResourceView>>,
    pub permission: Option<String>,
    /// Renderer names; `["json"]` when unset.
    pub renderers: Option<Vec<String>>,
    /// `Cache-Control: max-age`; 0 when unset.
    pub http_cache: Option<u32>,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn acl(mut self, acl: Acl) -> Self {
        self.acl = Some(acl);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    pub fn view(mut self, view: Arc<dyn ResourceView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn renderers<I, S>(mut self, renderers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.renderers = Some(renderers.into_iter().map(Into::into).collect());
        self
    }

    pub fn http_cache(mut self, seconds: u32) -> Self {
        self.http_cache = Some(seconds);
        self
    }

    /// Fill every unset field from `shared`.
    pub fn or(self, shared: &ResourceOptions) -> Self {
        ResourceOptions {
            name: self.name.or_else(|| shared.name.clone()),
            acl: self.acl.or_else(|| shared.acl.clone()),
            path: self.path.or_else(|| shared.path.clone()),
            path_prefix: self.path_prefix.or_else(|| shared.path_prefix.clone()),
            id_field: self.id_field.or_else(|| shared.id_field.clone()),
            view: self.view.or_else(|| shared.view.clone()),
            permission: self.permission.or_else(|| shared.permission.clone()),
            renderers: self.renderers.or_else(|| shared.renderers.clone()),
            http_cache: self.http_cache.or(shared.http_cache),
        }
    }

    /// Routing and view options of a configured resource.
    pub fn from_config(config: &ApiResourceConfig) -> Self {
        ResourceOptions {
            name: config.name.clone(),
            acl: config.acl.clone(),
            path: config.path.clone(),
            path_prefix: config.path_prefix.clone(),
            id_field: config.id_field.clone(),
            view: None,
            permission: config.permission.clone(),
            renderers: config.renderers.clone(),
            http_cache: None,
        }
    }
}

impl std::fmt::Debug for ResourceOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceOptions")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("path_prefix", &self.path_prefix)
            .field("id_field", &self.id_field)
            .field("view", &self.view.as_ref().map(|v| v.name().to_string()))
            .field("permission", &self.permission)
            .field("renderers", &self.renderers)
            .field("http_cache", &self.http_cache)
            .finish()
    }
}

/// Which verbs may be tunneled over POST and where the override is read from.
#[derive(Clone, Debug)]
pub struct TunnelingOptions {
    pub allowed_methods: Vec<Method>,
    /// Query parameter or form field carrying the method.
    pub param_name: String,
    pub header_name: String,
}

impl Default for TunnelingOptions {
    fn default() -> Self {
        TunnelingOptions {
            allowed_methods: vec![Method::DELETE, Method::PATCH, Method::PUT],
            param_name: "$method".into(),
            header_name: "X-HTTP-Method-Override".into(),
        }
    }
}

/// A registered route, as reported by [`Configurator::routes`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteInfo {
    pub name: String,
    pub pattern: String,
    pub methods: Vec<Method>,
    /// Media types the route accepts; `None` for any.
    pub accept: Option<Vec<String>>,
}

/// A registered view, as reported by [`Configurator::views`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewInfo {
    pub route_name: String,
    pub view: String,
    pub method: Method,
    pub renderer: String,
    pub accept: Option<String>,
    pub permission: Option<String>,
    pub http_cache: Option<u32>,
}

#[derive(Clone)]
struct ViewEntry {
    method: Method,
    renderer_name: String,
    renderer: Arc<dyn Renderer>,
    accept: Option<String>,
    config: ResourceConfig,
    acl: Option<Acl>,
    view: Arc<dyn ResourceView>,
    resource: Arc<dyn Resource>,
}

struct RouteEntry {
    name: String,
    pattern: RoutePattern,
    accept: Option<Vec<String>>,
    views: Vec<ViewEntry>,
}

impl RouteEntry {
    fn methods(&self) -> Vec<Method> {
        let mut out: Vec<Method> = Vec::new();
        for v in &self.views {
            if !out.contains(&v.method) {
                out.push(v.method.clone());
            }
        }
        out
    }

    /// `Allow` for a verb the route serves but the resource rejected.
    fn allowed_after(&self, resource: &dyn Resource, rejected: &Method) -> Vec<Method> {
        let implemented = resource.implemented_methods();
        let mut allowed: Vec<Method> = self
            .methods()
            .into_iter()
            .filter(|m| m != rejected)
            .filter(|m| implemented.as_ref().map_or(true, |i| i.contains(m)))
            .collect();
        if allowed.contains(&Method::GET) {
            allowed.push(Method::HEAD);
        }
        allowed
    }
}

/// Collects resource registrations and builds the router serving them.
pub struct Configurator {
    state: AppState,
    renderers: RendererRegistry,
    routes: Vec<RouteEntry>,
    tunneling: Option<TunnelingOptions>,
    cors: bool,
}

impl Configurator {
    pub fn new(store: Arc<dyn Store>, settings: Settings) -> Self {
        Configurator {
            state: AppState::new(store, settings),
            renderers: RendererRegistry::default(),
            routes: Vec::new(),
            tunneling: None,
            cors: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn add_renderer(&mut self, name: impl Into<String>, renderer: Arc<dyn Renderer>) -> &mut Self {
        self.renderers.add(name, renderer);
        self
    }

    /// Add permissive CORS headers to every response (development use).
    pub fn enable_cors(&mut self) -> &mut Self {
        self.cors = true;
        self
    }

    pub fn enable_post_tunneling(&mut self, options: TunnelingOptions) -> &mut Self {
        self.tunneling = Some(options);
        self
    }

    /// Register the routes and views of `resource`.
    pub fn add_resource<R: Resource>(&mut self, resource: R, options: ResourceOptions) -> Result<(), ConfigError> {
        let type_name = std::any::type_name::<R>();
        self.register(Arc::new(resource), type_name, options)
    }

    /// Register several resources under one path prefix with shared options. Options given
    /// to [`ResourceScope::add`] win over the shared ones.
    pub fn add_resources<F>(&mut self, path_prefix: &str, shared: ResourceOptions, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut ResourceScope<'_>) -> Result<(), ConfigError>,
    {
        let mut scope = ResourceScope {
            configurator: self,
            path_prefix: path_prefix.to_string(),
            shared,
        };
        f(&mut scope)
    }

    /// Resolve the models of `config` and register every configured resource.
    pub fn include_config(&mut self, config: &RestlerConfig) -> Result<ResolvedModels, ConfigError> {
        let resolved = resolve(config)?;
        for rc in &config.resources {
            let model = resolved.model(&rc.model).cloned().ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: rc.model.clone(),
            })?;
            let options = ResourceOptions::from_config(rc);
            match rc.kind {
                ResourceKind::Container => {
                    self.add_resource(ContainerResource::from_config(model, rc)?, options)?
                }
                ResourceKind::Item => self.add_resource(ItemResource::from_config(model, rc)?, options)?,
            }
        }
        tracing::info!(
            models = resolved.models.len(),
            resources = config.resources.len(),
            "included config"
        );
        Ok(resolved)
    }

    fn register(
        &mut self,
        resource: Arc<dyn Resource>,
        type_name: &str,
        options: ResourceOptions,
    ) -> Result<(), ConfigError> {
        let name = options
            .name
            .clone()
            .or_else(|| resource.default_name())
            .unwrap_or_else(|| type_route_name(type_name));

        let mut path = options
            .path
            .clone()
            .or_else(|| resource.default_path())
            .unwrap_or_else(|| path_from_name(&name));
        if let Some(prefix) = &options.path_prefix {
            path = join_path(prefix, &path);
        }
        if let Some(id_field) = &options.id_field {
            path = join_path(&path, &format!("{{{}}}", id_field));
        }
        tracing::debug!(name = %name, path = %path, "computed route");

        let acl = options
            .acl
            .clone()
            .or_else(|| resource.acl())
            .or_else(|| self.state.settings.default_acl.clone());

        let view = options.view.clone().unwrap_or_else(|| Arc::new(DefaultView));
        let served = view.methods();
        let methods: Vec<Method> = self
            .state
            .settings
            .resource_methods()?
            .into_iter()
            .filter(|m| served.contains(m))
            .collect();
        if methods.is_empty() {
            return Err(ConfigError::NoViewMethods(view.name().to_string()));
        }

        let base = ResourceConfig {
            permission: options.permission.clone(),
            http_cache: Some(options.http_cache.unwrap_or(0)),
        };
        let entry = |method: &Method, renderer_name: &str, renderer: &Arc<dyn Renderer>, accept: Option<String>| {
            let mut config = base.clone();
            if let Some(view_config) = view.view_config(method) {
                config = config.merged_with(&view_config);
            }
            if let Some(resource_config) = resource.resource_config(method) {
                config = config.merged_with(&resource_config);
            }
            ViewEntry {
                method: method.clone(),
                renderer_name: renderer_name.to_string(),
                renderer: renderer.clone(),
                accept,
                config,
                acl: acl.clone(),
                view: view.clone(),
                resource: resource.clone(),
            }
        };

        let renderer_names = options.renderers.clone().unwrap_or_else(|| vec!["json".to_string()]);
        let mut bound = Vec::with_capacity(renderer_names.len());
        let mut new_routes = Vec::with_capacity(renderer_names.len() + 1);
        for renderer_name in &renderer_names {
            let renderer = self.renderers.get(renderer_name)?;
            let (ext, accept) = ext_and_accept(renderer_name);
            let accept = accept
                .map(str::to_string)
                .unwrap_or_else(|| renderer.media_type().to_string());
            let views = methods
                .iter()
                .map(|m| entry(m, renderer_name, &renderer, None))
                .collect();
            new_routes.push(RouteEntry {
                name: format!("{}.{}", name, ext),
                pattern: RoutePattern::parse(&format!("{}.{}", path, ext))?,
                accept: None,
                views,
            });
            bound.push((renderer_name.as_str(), renderer, accept));
        }

        let mut views = Vec::with_capacity(bound.len() * methods.len());
        for (renderer_name, renderer, accept) in &bound {
            for m in &methods {
                views.push(entry(m, renderer_name, renderer, Some(accept.clone())));
            }
        }
        new_routes.push(RouteEntry {
            name: name.clone(),
            pattern: RoutePattern::parse(&path)?,
            accept: Some(bound.iter().map(|(_, _, a)| a.clone()).collect()),
            views,
        });

        for route in &new_routes {
            if self.routes.iter().any(|r| r.name == route.name) {
                return Err(ConfigError::DuplicateName(format!("route {}", route.name)));
            }
        }
        for route in new_routes {
            tracing::debug!(
                route = %route.name,
                pattern = %route.pattern.as_str(),
                methods = ?route.methods(),
                accept = ?route.accept,
                "adding route"
            );
            for v in &route.views {
                tracing::debug!(
                    route = %route.name,
                    view = %v.view.name(),
                    method = %v.method,
                    renderer = %v.renderer_name,
                    accept = v.accept.as_deref().unwrap_or("ANY"),
                    "adding view"
                );
            }
            self.routes.push(route);
        }
        Ok(())
    }

    /// Registered routes in matching order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes
            .iter()
            .map(|r| RouteInfo {
                name: r.name.clone(),
                pattern: r.pattern.as_str().to_string(),
                methods: r.methods(),
                accept: r.accept.clone(),
            })
            .collect()
    }

    pub fn views(&self) -> Vec<ViewInfo> {
        self.routes
            .iter()
            .flat_map(|r| {
                r.views.iter().map(move |v| ViewInfo {
                    route_name: r.name.clone(),
                    view: v.view.name().to_string(),
                    method: v.method.clone(),
                    renderer: v.renderer_name.clone(),
                    accept: v.accept.clone(),
                    permission: v.config.permission.clone(),
                    http_cache: v.config.http_cache,
                })
            })
            .collect()
    }

    /// URL for a registered route.
    pub fn route_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, RestError> {
        self.routes
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| RestError::Internal(format!("no route named {}", name)))?
            .pattern
            .generate(params)
    }

    pub fn into_router(self) -> Router {
        let body_limit = self.state.settings.body_limit;
        let urls: HashMap<String, RoutePattern> = self
            .routes
            .iter()
            .map(|r| (r.name.clone(), r.pattern.clone()))
            .collect();
        let table = Arc::new(RouteTable {
            routes: self.routes,
            context: RequestContext::new(self.state, RouteUrls::new(urls)),
            body_limit,
        });
        tracing::info!(routes = table.routes.len(), "built router");

        let mut router = Router::new().fallback(dispatch).with_state(table);
        if let Some(options) = self.tunneling {
            let state = Arc::new(tunneling::TunnelState::new(options, body_limit));
            router = router.layer(from_fn_with_state(state, tunneling::tunnel_post));
        }
        if self.cors {
            router = router.layer(from_fn(cors::add_cors_headers));
        }
        router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
    }
}

/// Registration scope of [`Configurator::add_resources`].
pub struct ResourceScope<'a> {
    configurator: &'a mut Configurator,
    path_prefix: String,
    shared: ResourceOptions,
}

impl ResourceScope<'_> {
    pub fn add<R: Resource>(&mut self, resource: R, options: ResourceOptions) -> Result<(), ConfigError> {
        let mut options = options.or(&self.shared);
        options.path_prefix = Some(match options.path_prefix.take() {
            Some(inner) => join_path(&self.path_prefix, &inner),
            None => self.path_prefix.clone(),
        });
        self.configurator.add_resource(resource, options)
    }
}

struct RouteTable {
    routes: Vec<RouteEntry>,
    context: Arc<RequestContext>,
    body_limit: usize,
}

impl RouteTable {
    /// First route whose pattern, method and Accept header all match.
    fn select(
        &self,
        path: &str,
        method: &Method,
        accept: Option<&str>,
    ) -> Result<(&RouteEntry, &ViewEntry, BTreeMap<String, String>), RestError> {
        let mut allowed: Vec<Method> = Vec::new();
        let mut not_acceptable = false;
        for route in &self.routes {
            let Some(matchdict) = route.pattern.matches(path)? else {
                continue;
            };
            let candidates: Vec<&ViewEntry> = route.views.iter().filter(|v| v.method == *method).collect();
            if candidates.is_empty() {
                for m in route.methods() {
                    if !allowed.contains(&m) {
                        allowed.push(m);
                    }
                }
                continue;
            }
            let chosen = match &route.accept {
                None => Some(0),
                Some(_) => {
                    let offers: Vec<&str> = candidates.iter().map(|v| v.accept.as_deref().unwrap_or("*/*")).collect();
                    negotiate(accept, &offers)
                }
            };
            match chosen {
                Some(i) => return Ok((route, candidates[i], matchdict)),
                None => not_acceptable = true,
            }
        }
        if not_acceptable {
            return Err(RestError::NotAcceptable(format!(
                "No renderer for Accept: {}",
                accept.unwrap_or("")
            )));
        }
        if !allowed.is_empty() {
            if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
                allowed.push(Method::HEAD);
            }
            return Err(RestError::MethodNotAllowed {
                method: method.clone(),
                allowed,
            });
        }
        Err(RestError::NotFound(format!("No route matches {}", path)))
    }

    async fn handle(&self, request: Request) -> Result<Response, RestError> {
        let (parts, body) = request.into_parts();
        let is_head = parts.method == Method::HEAD;
        let lookup_method = if is_head { Method::GET } else { parts.method.clone() };
        let accept = parts.headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
        let (route, view, matchdict) = match self.select(parts.uri.path(), &lookup_method, accept) {
            Ok(found) => found,
            Err(RestError::MethodNotAllowed { allowed, .. }) => {
                return Err(RestError::MethodNotAllowed {
                    method: parts.method.clone(),
                    allowed,
                })
            }
            Err(e) => return Err(e),
        };

        let EffectivePrincipals(principals) = EffectivePrincipals::from_parts(&parts);
        if !authorize(view.acl.as_ref(), &principals, view.config.permission.as_deref()) {
            tracing::warn!(
                route = %route.name,
                method = %parts.method,
                permission = ?view.config.permission,
                "permission denied"
            );
            return Err(RestError::Forbidden(format!(
                "Permission {} denied",
                view.config.permission.as_deref().unwrap_or("")
            )));
        }

        let body = axum::body::to_bytes(body, self.body_limit)
            .await
            .map_err(|e| RestError::PayloadTooLarge(e.to_string()))?;
        let req = ResourceRequest::new(parts.method.clone(), parts.uri.clone(), self.context.state.clone())?
            .with_headers(parts.headers)
            .with_body(body)
            .with_matchdict(matchdict)
            .with_route(&route.name, self.context.urls.clone())
            .with_principals(principals);

        let reply = match view.view.dispatch(view.resource.as_ref(), &req).await {
            Err(RestError::MethodNotAllowed { method, allowed }) if allowed.is_empty() => {
                return Err(RestError::MethodNotAllowed {
                    allowed: route.allowed_after(view.resource.as_ref(), &method),
                    method,
                })
            }
            other => other?,
        };
        let response = match reply {
            Some(reply) => render_reply(&reply, view.renderer.as_ref(), view.config.http_cache)?,
            None => {
                let mut response = no_content();
                set_cache_control(&mut response, view.config.http_cache);
                response
            }
        };
        Ok(if is_head { strip_body(response) } else { response })
    }
}

async fn dispatch(State(table): State<Arc<RouteTable>>, request: Request) -> Response {
    match table.handle(request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{Reply, ResourceResult};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;

    struct ThingResource;

    #[async_trait]
    impl Resource for ThingResource {
        async fn get(&self, _req: &ResourceRequest) -> ResourceResult {
            Ok(Some(Reply::ok(json!({"thing": 1}))))
        }
    }

    fn configurator(settings: Settings) -> Configurator {
        Configurator::new(Arc::new(MemoryStore::new()), settings)
    }

    #[test]
    fn derives_name_and_path_from_type() {
        let mut config = configurator(Settings::default());
        config.add_resource(ThingResource, ResourceOptions::new()).unwrap();
        let routes = config.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].name, "tests.thing.json");
        assert_eq!(routes[0].pattern, "/tests/thing.json");
        assert_eq!(routes[0].accept, None);
        assert_eq!(routes[1].name, "tests.thing");
        assert_eq!(routes[1].pattern, "/tests/thing");
        assert_eq!(routes[1].accept, Some(vec!["application/json".to_string()]));
        assert_eq!(config.views().len(), 10);
        assert!(config.views().iter().all(|v| v.http_cache == Some(0)));
    }

    #[test]
    fn prefix_and_id_field() {
        let mut config = configurator(Settings::default());
        config
            .add_resource(
                ThingResource,
                ResourceOptions::new().name("thing").path_prefix("/api").id_field("id"),
            )
            .unwrap();
        assert_eq!(config.routes()[1].pattern, "/api/thing/{id}");
        assert_eq!(config.route_url("thing", &[("id", "7")]).unwrap(), "/api/thing/7");
        assert_eq!(config.route_url("thing.json", &[("id", "7")]).unwrap(), "/api/thing/7.json");
    }

    #[test]
    fn one_view_per_method_and_renderer() {
        let mut config = configurator(Settings::default());
        config
            .add_resource(ThingResource, ResourceOptions::new().name("thing").renderers(["json", "csv"]))
            .unwrap();
        let names: Vec<String> = config.routes().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["thing.json", "thing.csv", "thing"]);
        let views = config.views();
        assert_eq!(views.len(), 5 + 5 + 10);
        let bare: Vec<&ViewInfo> = views.iter().filter(|v| v.route_name == "thing").collect();
        assert_eq!(bare.iter().filter(|v| v.accept.as_deref() == Some("text/csv")).count(), 5);
    }

    #[test]
    fn resource_methods_setting_limits_views() {
        let settings = Settings {
            resource_methods: vec!["get".into()],
            ..Settings::default()
        };
        let mut config = configurator(settings);
        config.add_resource(ThingResource, ResourceOptions::new().name("thing")).unwrap();
        assert_eq!(config.routes()[1].methods, vec![Method::GET]);
        assert_eq!(config.views().len(), 2);
    }

    #[test]
    fn no_view_methods_is_an_error() {
        let settings = Settings {
            resource_methods: vec!["options".into()],
            ..Settings::default()
        };
        let mut config = configurator(settings);
        let err = config.add_resource(ThingResource, ResourceOptions::new()).unwrap_err();
        assert!(matches!(err, ConfigError::NoViewMethods(ref v) if v == "DefaultView"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut config = configurator(Settings::default());
        config.add_resource(ThingResource, ResourceOptions::new().name("thing")).unwrap();
        let err = config
            .add_resource(ThingResource, ResourceOptions::new().name("thing"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(_)));
    }

    #[test]
    fn unknown_renderer_is_an_error() {
        let mut config = configurator(Settings::default());
        let err = config
            .add_resource(ThingResource, ResourceOptions::new().renderers(["xml"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRenderer(ref r) if r == "xml"));
    }

    #[test]
    fn scoped_registration_shares_options() {
        let mut config = configurator(Settings::default());
        config
            .add_resources("/api", ResourceOptions::new().permission("view"), |scope| {
                scope.add(ThingResource, ResourceOptions::new().name("a"))?;
                scope.add(ThingResource, ResourceOptions::new().name("b").permission("edit"))
            })
            .unwrap();
        let routes = config.routes();
        assert_eq!(routes[1].pattern, "/api/a");
        assert_eq!(routes[3].pattern, "/api/b");
        let views = config.views();
        assert!(views.iter().filter(|v| v.route_name == "a").all(|v| v.permission.as_deref() == Some("view")));
        assert!(views.iter().filter(|v| v.route_name == "b").all(|v| v.permission.as_deref() == Some("edit")));
    }
}
