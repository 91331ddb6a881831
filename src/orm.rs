//! Store-backed CRUD resources over a [`Model`]: a container (list/create) and an item
//! (read/replace/update/delete) resource.

use crate::acl::Acl;
use crate::config::{ApiResourceConfig, Model};
use crate::error::{ConfigError, RestError};
use crate::params::get_params;
use crate::query::{parse_filters, parse_ordering, parse_page, Operator, Query};
use crate::request::ResourceRequest;
use crate::resource::Resource;
use crate::response::{Reply, ResourceResult};
use crate::store::Row;
use async_trait::async_trait;
use axum::http::Method;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Hook applied to every row before it is returned.
pub type ItemProcessor = Arc<dyn Fn(&ResourceRequest, Row) -> Result<Row, RestError> + Send + Sync>;

/// Behaviour shared by both resources: the model, field selection and item processing.
#[derive(Clone)]
struct OrmCore {
    model: Arc<Model>,
    default_fields: Option<Vec<String>>,
    item_processor: Option<ItemProcessor>,
    acl: Option<Acl>,
    location_route: Option<String>,
}

impl OrmCore {
    fn new(model: Arc<Model>) -> Self {
        OrmCore {
            model,
            default_fields: None,
            item_processor: None,
            acl: None,
            location_route: None,
        }
    }

    /// Columns to return: `fields` from the query string (`*` for all), else the
    /// resource's or the settings' defaults. `None` returns the whole row.
    fn response_fields(&self, req: &ResourceRequest) -> Result<Option<Vec<String>>, RestError> {
        let requested: Vec<String> = get_params::<Vec<String>>(req.params(), "fields")?
            .into_iter()
            .flatten()
            .filter(|f| !f.is_empty())
            .collect();
        if !requested.is_empty() {
            if requested.iter().any(|f| f == "*") {
                return Ok(None);
            }
            for field in &requested {
                self.model.require_column(field)?;
            }
            return Ok(Some(requested));
        }
        if let Some(defaults) = &self.default_fields {
            return Ok(Some(defaults.clone()));
        }
        Ok(req.settings().default_response_fields.as_ref().map(|fields| {
            fields
                .iter()
                .filter(|f| self.model.has_column(f))
                .cloned()
                .collect()
        }))
    }

    fn shape(&self, req: &ResourceRequest, row: Row, fields: Option<&[String]>) -> Result<Value, RestError> {
        let row = match fields {
            Some(fields) => {
                let mut selected = Map::with_capacity(fields.len());
                for name in fields {
                    selected.insert(name.clone(), row.get(name).cloned().unwrap_or(Value::Null));
                }
                selected
            }
            None => row,
        };
        let row = match &self.item_processor {
            Some(process) => process(req, row)?,
            None => row,
        };
        Ok(Value::Object(row))
    }

    /// `Location` for a stored row when a location route is configured.
    fn location(&self, req: &ResourceRequest, row: &Row) -> Result<Option<String>, RestError> {
        let Some(route) = &self.location_route else {
            return Ok(None);
        };
        let values: Vec<(String, String)> = self
            .model
            .pk_columns
            .iter()
            .map(|c| {
                let v = match row.get(c) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                (c.clone(), v)
            })
            .collect();
        let params: Vec<(&str, &str)> = values.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        req.route_url(route, &params).map(Some)
    }

    fn incoming(&self, req: &ResourceRequest) -> Result<Row, RestError> {
        self.model.coerce_data(req.extract_data()?)
    }
}

macro_rules! orm_builders {
    () => {
        pub fn model(&self) -> &Arc<Model> {
            &self.core.model
        }

        /// Fields returned when the request names none.
        pub fn default_fields(mut self, fields: Vec<String>) -> Self {
            self.core.default_fields = Some(fields);
            self
        }

        pub fn item_processor(mut self, processor: ItemProcessor) -> Self {
            self.core.item_processor = Some(processor);
            self
        }

        pub fn with_acl(mut self, acl: Acl) -> Self {
            self.core.acl = Some(acl);
            self
        }

        /// Named route whose URL (filled from the primary key) becomes the `Location` of created rows.
        pub fn location_route(mut self, route: impl Into<String>) -> Self {
            self.core.location_route = Some(route.into());
            self
        }
    };
}

/// Lists rows with filtering, ordering and pagination; creates rows on POST.
#[derive(Clone)]
pub struct ContainerResource {
    core: OrmCore,
    key: String,
    item_key: String,
    filtering_enabled: bool,
    supported_operators: Vec<Operator>,
    ordering_enabled: bool,
    ordering_default: Vec<String>,
    pagination_enabled: bool,
    default_page_size: u64,
    max_page_size: Option<u64>,
}

impl ContainerResource {
    pub fn new(model: Arc<Model>) -> Self {
        ContainerResource {
            core: OrmCore::new(model),
            key: "items".into(),
            item_key: "item".into(),
            filtering_enabled: true,
            supported_operators: Operator::ALL.to_vec(),
            ordering_enabled: true,
            ordering_default: Vec::new(),
            pagination_enabled: true,
            default_page_size: 50,
            max_page_size: Some(250),
        }
    }

    orm_builders!();

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn item_key(mut self, key: impl Into<String>) -> Self {
        self.item_key = key.into();
        self
    }

    pub fn filtering(mut self, enabled: bool) -> Self {
        self.filtering_enabled = enabled;
        self
    }

    pub fn supported_operators(mut self, operators: Vec<Operator>) -> Self {
        self.supported_operators = operators;
        self
    }

    pub fn ordering(mut self, enabled: bool) -> Self {
        self.ordering_enabled = enabled;
        self
    }

    /// Ordering used when the request gives none, e.g. `["-created_at", "id"]`.
    pub fn ordering_default(mut self, ordering: Vec<String>) -> Self {
        self.ordering_default = ordering;
        self
    }

    pub fn pagination(mut self, enabled: bool, default_page_size: u64, max_page_size: Option<u64>) -> Self {
        self.pagination_enabled = enabled;
        self.default_page_size = default_page_size;
        self.max_page_size = max_page_size;
        self
    }

    pub fn from_config(model: Arc<Model>, config: &ApiResourceConfig) -> Result<Self, ConfigError> {
        let mut resource = ContainerResource::new(model)
            .filtering(config.filtering.enabled)
            .ordering(config.ordering.enabled)
            .ordering_default(config.ordering.default.clone())
            .pagination(
                config.pagination.enabled,
                config.pagination.default_page_size,
                config.pagination.max_page_size,
            );
        if let Some(ops) = &config.filtering.operators {
            let ops = ops
                .iter()
                .map(|op| {
                    Operator::parse(op)
                        .ok_or_else(|| ConfigError::Validation(format!("unsupported operator: {}", op)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            resource = resource.supported_operators(ops);
        }
        if let Some(key) = &config.key {
            resource = resource.key(key.clone());
        }
        if let Some(key) = &config.item_key {
            resource = resource.item_key(key.clone());
        }
        Ok(apply_common(resource, config))
    }

    fn query(&self, req: &ResourceRequest) -> Result<Query, RestError> {
        let model = &self.core.model;
        let params = req.params();
        let filter = if self.filtering_enabled {
            parse_filters(model, params, &self.supported_operators)?
        } else {
            None
        };
        let ordering = if self.ordering_enabled {
            parse_ordering(model, params, &self.ordering_default)?
        } else {
            Vec::new()
        };
        Ok(Query {
            filter,
            ordering,
            limit: None,
            offset: None,
        })
    }
}

#[async_trait]
impl Resource for ContainerResource {
    fn implemented_methods(&self) -> Option<Vec<Method>> {
        Some(vec![Method::GET, Method::POST])
    }

    async fn get(&self, req: &ResourceRequest) -> ResourceResult {
        let model = &self.core.model;
        let fields = self.core.response_fields(req)?;
        let mut query = self.query(req)?;
        let mut body = Map::new();
        if self.pagination_enabled {
            if let Some(page) = parse_page(req.params(), self.default_page_size, self.max_page_size)? {
                let count = req.store().count(model, query.filter.as_ref()).await?;
                query.limit = Some(page.page_size);
                query.offset = Some(page.offset());
                let data = serde_json::to_value(page.data(count))
                    .map_err(|e| RestError::Internal(e.to_string()))?;
                body.insert("pagination_data".into(), data);
            }
        }
        let rows = req.store().fetch_all(model, &query).await?;
        tracing::debug!(model = %model.id, rows = rows.len(), "fetched items");
        let items = rows
            .into_iter()
            .map(|row| self.core.shape(req, row, fields.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;
        body.insert(self.key.clone(), Value::Array(items));
        Ok(Some(Reply::ok(Value::Object(body))))
    }

    async fn post(&self, req: &ResourceRequest) -> ResourceResult {
        let data = self.core.incoming(req)?;
        let row = req.store().insert(&self.core.model, &data).await?;
        let location = self.core.location(req, &row)?;
        let fields = self.core.response_fields(req)?;
        let item = self.core.shape(req, row, fields.as_deref())?;
        let mut body = Map::new();
        body.insert(self.item_key.clone(), item);
        let reply = Reply::created(Value::Object(body));
        Ok(Some(match location {
            Some(location) => reply.with_location(location),
            None => reply,
        }))
    }

    fn acl(&self) -> Option<Acl> {
        self.core.acl.clone()
    }

    fn default_name(&self) -> Option<String> {
        Some(self.core.model.id.clone())
    }
}

/// One row identified by the route's placeholders (normally the primary key).
#[derive(Clone)]
pub struct ItemResource {
    core: OrmCore,
    key: String,
}

impl ItemResource {
    pub fn new(model: Arc<Model>) -> Self {
        ItemResource {
            core: OrmCore::new(model),
            key: "item".into(),
        }
    }

    orm_builders!();

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn from_config(model: Arc<Model>, config: &ApiResourceConfig) -> Result<Self, ConfigError> {
        let mut resource = ItemResource::new(model);
        if let Some(key) = &config.key {
            resource = resource.key(key.clone());
        }
        Ok(apply_common(resource, config))
    }

    /// Route values decoded as JSON where possible (`"1"` -> 1), then coerced per column.
    fn keys(&self, req: &ResourceRequest) -> Result<Row, RestError> {
        let mut keys = Row::new();
        for (name, raw) in req.matchdict() {
            let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            keys.insert(name.clone(), self.core.model.coerce(name, value)?);
        }
        Ok(keys)
    }

    fn not_found(keys: &Row) -> RestError {
        RestError::NotFound(format!(
            "No item found for filters: {}",
            Value::Object(keys.clone())
        ))
    }

    fn wrap(&self, req: &ResourceRequest, row: Row) -> Result<Value, RestError> {
        let fields = self.core.response_fields(req)?;
        let item = self.core.shape(req, row, fields.as_deref())?;
        let mut body = Map::new();
        body.insert(self.key.clone(), item);
        Ok(Value::Object(body))
    }

    async fn fetch(&self, req: &ResourceRequest, keys: &Row) -> Result<Row, RestError> {
        req.store()
            .fetch_one(&self.core.model, keys)
            .await?
            .ok_or_else(|| Self::not_found(keys))
    }
}

#[async_trait]
impl Resource for ItemResource {
    fn implemented_methods(&self) -> Option<Vec<Method>> {
        Some(vec![Method::DELETE, Method::GET, Method::PATCH, Method::PUT])
    }

    async fn get(&self, req: &ResourceRequest) -> ResourceResult {
        let keys = self.keys(req)?;
        let row = self.fetch(req, &keys).await?;
        Ok(Some(Reply::ok(self.wrap(req, row)?)))
    }

    async fn patch(&self, req: &ResourceRequest) -> ResourceResult {
        let keys = self.keys(req)?;
        self.fetch(req, &keys).await?;
        let data = self.core.incoming(req)?;
        let row = req
            .store()
            .update(&self.core.model, &keys, &data)
            .await?
            .ok_or_else(|| Self::not_found(&keys))?;
        Ok(Some(Reply::ok(self.wrap(req, row)?)))
    }

    async fn put(&self, req: &ResourceRequest) -> ResourceResult {
        let keys = self.keys(req)?;
        let data = self.core.incoming(req)?;
        let store = req.store();
        if store.fetch_one(&self.core.model, &keys).await?.is_some() {
            if let Some(row) = store.update(&self.core.model, &keys, &data).await? {
                return Ok(Some(Reply::ok(self.wrap(req, row)?)));
            }
        }
        let mut data = data;
        for (k, v) in &keys {
            data.insert(k.clone(), v.clone());
        }
        let row = store.insert(&self.core.model, &data).await?;
        let location = self.core.location(req, &row)?;
        let reply = Reply::created(self.wrap(req, row)?);
        Ok(Some(match location {
            Some(location) => reply.with_location(location),
            None => reply,
        }))
    }

    async fn delete(&self, req: &ResourceRequest) -> ResourceResult {
        let keys = self.keys(req)?;
        let row = req
            .store()
            .delete(&self.core.model, &keys)
            .await?
            .ok_or_else(|| Self::not_found(&keys))?;
        Ok(Some(Reply::ok(self.wrap(req, row)?)))
    }

    fn acl(&self) -> Option<Acl> {
        self.core.acl.clone()
    }

    fn default_name(&self) -> Option<String> {
        Some(format!("{}.item", self.core.model.id))
    }

    /// The model path followed by one placeholder per primary key column.
    fn default_path(&self) -> Option<String> {
        let model = &self.core.model;
        let mut path = crate::case::path_from_name(&model.id);
        for pk in &model.pk_columns {
            path = crate::case::join_path(&path, &format!("{{{}}}", pk));
        }
        Some(path)
    }
}

trait HasCore: Sized {
    fn core_mut(&mut self) -> &mut OrmCore;
}

impl HasCore for ContainerResource {
    fn core_mut(&mut self) -> &mut OrmCore {
        &mut self.core
    }
}

impl HasCore for ItemResource {
    fn core_mut(&mut self) -> &mut OrmCore {
        &mut self.core
    }
}

fn apply_common<R: HasCore>(mut resource: R, config: &ApiResourceConfig) -> R {
    let core = resource.core_mut();
    if let Some(fields) = &config.default_fields {
        core.default_fields = Some(fields.clone());
    }
    if let Some(route) = &config.location_route {
        core.location_route = Some(route.clone());
    }
    if let Some(acl) = &config.acl {
        core.acl = Some(acl.clone());
    }
    resource
}
