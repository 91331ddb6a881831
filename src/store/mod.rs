//! Row stores: the persistence seam ORM resources talk to.
//!
//! Rows travel as JSON objects keyed by column name. Keys passed to
//! [`Store::fetch_one`], [`Store::update`] and [`Store::delete`] are column
//! equality conditions (normally the primary key taken from the route).

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_table_sql, PgStore};

use crate::config::Model;
use crate::error::RestError;
use crate::query::{Filter, Query};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn count(&self, model: &Model, filter: Option<&Filter>) -> Result<u64, RestError>;

    async fn fetch_all(&self, model: &Model, query: &Query) -> Result<Vec<Row>, RestError>;

    async fn fetch_one(&self, model: &Model, keys: &Row) -> Result<Option<Row>, RestError>;

    /// Insert one row and return it as stored (defaults and serial keys filled in).
    async fn insert(&self, model: &Model, data: &Row) -> Result<Row, RestError>;

    /// Update the row matching `keys`; `None` when there is no such row.
    async fn update(&self, model: &Model, keys: &Row, data: &Row) -> Result<Option<Row>, RestError>;

    /// Delete the row matching `keys` and return it.
    async fn delete(&self, model: &Model, keys: &Row) -> Result<Option<Row>, RestError>;
}
