//! Connection sources
//!
//! Another ORM living in the same process usually already knows where its
//! databases are. A [`ConnectionSource`] exposes those connections so that
//! gateways can be inferred instead of declared twice.

mod database_yml;
mod env;

pub use database_yml::DatabaseYmlSource;
pub use env::EnvConnectionSource;

use crate::error::Result;
use serde_json::Value;
use std::collections::BTreeMap;

/// Address and adapter options of one connection known to another ORM
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSpec {
    pub uri: String,
    pub options: BTreeMap<String, Value>,
}

impl ConnectionSpec {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            options: BTreeMap::new(),
        }
    }
}

pub trait ConnectionSource: Send + Sync {
    /// Human-readable name used in logs and errors
    fn name(&self) -> &str;

    /// Every connection this source knows about, keyed by connection name
    fn list_connections(&self) -> Result<BTreeMap<String, ConnectionSpec>>;
}
