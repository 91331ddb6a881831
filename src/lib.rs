//! Restler: declarative REST resources for axum.
//!
//! Resources implement one async method per HTTP verb. A [`Configurator`] registers them
//! under conventional routes with content negotiation, ACL checks and optional POST
//! tunneling and CORS, then builds an axum `Router`. [`orm`] provides list/create and
//! read/replace/update/delete resources over a [`Store`].

pub mod acl;
pub mod case;
pub mod config;
pub mod configurator;
pub mod error;
pub mod middleware;
pub mod orm;
pub mod params;
pub mod query;
pub mod renderers;
pub mod request;
pub mod resource;
pub mod response;
pub mod routing;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;
pub mod view;

pub use acl::{Ace, Acl, Action, Principals, AUTHENTICATED, EVERYONE};
pub use config::{load_from_path, load_from_str, resolve, Model, ResolvedModels, RestlerConfig};
pub use configurator::{Configurator, ResourceOptions, ResourceScope, RouteInfo, TunnelingOptions, ViewInfo};
pub use error::{ConfigError, RestError};
pub use orm::{ContainerResource, ItemProcessor, ItemResource};
pub use renderers::{CsvRenderer, JsonRenderer, Renderer};
pub use request::ResourceRequest;
pub use resource::{Resource, ResourceConfig};
pub use response::{Reply, ResourceResult};
pub use settings::Settings;
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Row, Store};
pub use view::{DefaultView, ResourceView};
