use super::registration::{discover_components, ComponentDefinition, ComponentKind};
use super::{ContainerFactory, Disconnect, MappingConfiguration};
use crate::config::{GatewaySpec, ADAPTER_MEMORY, ADAPTER_SQL};
use crate::error::{BridgeError, Result};
use dashmap::DashMap;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::{debug, info, warn};

/// In-process gateway storing datasets as JSON rows
pub struct MemoryGateway {
    uri: String,
    datasets: DashMap<String, Vec<Value>>,
}

impl MemoryGateway {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            datasets: DashMap::new(),
        }
    }

    pub fn insert(&self, dataset: &str, row: Value) {
        self.datasets.entry(dataset.to_string()).or_default().push(row);
    }

    pub fn dataset(&self, dataset: &str) -> Vec<Value> {
        self.datasets
            .get(dataset)
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }

    pub fn dataset_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.datasets.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn clear(&self) {
        self.datasets.clear();
    }
}

pub enum Gateway {
    Sql { uri: String, pool: Pool },
    Memory(MemoryGateway),
}

impl Gateway {
    pub fn adapter(&self) -> &'static str {
        match self {
            Gateway::Sql { .. } => ADAPTER_SQL,
            Gateway::Memory(_) => ADAPTER_MEMORY,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Gateway::Sql { uri, .. } => uri,
            Gateway::Memory(memory) => &memory.uri,
        }
    }

    pub fn as_memory(&self) -> Option<&MemoryGateway> {
        match self {
            Gateway::Memory(memory) => Some(memory),
            Gateway::Sql { .. } => None,
        }
    }

    pub fn pool(&self) -> Option<&Pool> {
        match self {
            Gateway::Sql { pool, .. } => Some(pool),
            Gateway::Memory(_) => None,
        }
    }

    fn disconnect(&self) {
        match self {
            Gateway::Sql { pool, .. } => pool.close(),
            Gateway::Memory(memory) => memory.clear(),
        }
    }
}

/// Live gateways and registered components built from one configuration
pub struct GatewayContainer {
    gateways: BTreeMap<String, Gateway>,
    components: Vec<ComponentDefinition>,
    disconnected: AtomicBool,
}

impl GatewayContainer {
    pub fn gateway(&self, name: &str) -> Option<&Gateway> {
        self.gateways.get(name)
    }

    pub fn gateway_names(&self) -> Vec<&str> {
        self.gateways.keys().map(String::as_str).collect()
    }

    pub fn components(&self) -> &[ComponentDefinition] {
        &self.components
    }

    pub fn components_of(&self, kind: ComponentKind) -> impl Iterator<Item = &ComponentDefinition> {
        self.components.iter().filter(move |c| c.kind == kind)
    }

    pub fn component(&self, identifier: &str) -> Option<&ComponentDefinition> {
        self.components.iter().find(|c| c.identifier == identifier)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    /// Ping every SQL gateway. Returns the names that answered.
    pub async fn check_connections(&self) -> Result<Vec<String>> {
        let mut checked = Vec::new();

        for (name, gateway) in &self.gateways {
            let Some(pool) = gateway.pool() else {
                continue;
            };

            let client = pool.get().await.map_err(|e| BridgeError::ConnectionFailed {
                gateway: name.clone(),
                cause: e.to_string(),
            })?;

            client
                .execute("SELECT 1", &[])
                .await
                .map_err(|e| BridgeError::ConnectionFailed {
                    gateway: name.clone(),
                    cause: format!("Ping failed: {}", e),
                })?;

            debug!("Gateway {} is reachable", name);
            checked.push(name.clone());
        }

        Ok(checked)
    }
}

impl Disconnect for GatewayContainer {
    fn disconnect(&self) {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return;
        }

        for gateway in self.gateways.values() {
            gateway.disconnect();
        }

        info!("Disconnected container ({} gateways)", self.gateways.len());
    }
}

impl Drop for GatewayContainer {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Default factory: memory gateways in-process, SQL gateways as Postgres pools
pub struct GatewayContainerFactory {
    max_connections_per_gateway: usize,
}

impl GatewayContainerFactory {
    pub fn new(max_connections_per_gateway: usize) -> Self {
        Self {
            max_connections_per_gateway,
        }
    }

    fn build_gateway(&self, name: &str, spec: &GatewaySpec) -> Result<Gateway> {
        if spec.uri.trim().is_empty() {
            return Err(BridgeError::InvalidGatewaySpec {
                gateway: name.to_string(),
                cause: "uri is empty".to_string(),
            });
        }

        match spec.adapter.as_str() {
            ADAPTER_MEMORY => Ok(Gateway::Memory(MemoryGateway::new(&spec.uri))),
            ADAPTER_SQL if is_postgres_uri(&spec.uri) => {
                let max_size = spec
                    .options
                    .get("pool")
                    .and_then(Value::as_u64)
                    .map(|n| n as usize)
                    .unwrap_or(self.max_connections_per_gateway);

                let pool = create_pool(&spec.uri, max_size).map_err(|cause| {
                    BridgeError::ContainerBuild {
                        gateway: name.to_string(),
                        cause,
                    }
                })?;

                Ok(Gateway::Sql {
                    uri: spec.uri.clone(),
                    pool,
                })
            }
            ADAPTER_SQL => Err(BridgeError::UnsupportedAdapter {
                gateway: name.to_string(),
                adapter: format!("{} ({})", spec.adapter, uri_scheme(&spec.uri)),
            }),
            other => Err(BridgeError::UnsupportedAdapter {
                gateway: name.to_string(),
                adapter: other.to_string(),
            }),
        }
    }
}

impl Default for GatewayContainerFactory {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ContainerFactory for GatewayContainerFactory {
    type Container = GatewayContainer;

    fn build(&self, configuration: &MappingConfiguration) -> Result<GatewayContainer> {
        // Any early return drops the partial container, which closes its pools
        let mut container = GatewayContainer {
            gateways: BTreeMap::new(),
            components: Vec::new(),
            disconnected: AtomicBool::new(false),
        };

        for (name, spec) in configuration.gateways() {
            let gateway = self.build_gateway(name, spec)?;
            container.gateways.insert(name.clone(), gateway);
        }

        let mut seen = HashSet::new();
        for registration in configuration.auto_registrations() {
            for component in discover_components(registration)? {
                if !seen.insert(component.identifier.clone()) {
                    warn!(
                        "Skipping duplicate {} {} from {}",
                        component.kind,
                        component.identifier,
                        registration.root.display()
                    );
                    continue;
                }
                container.components.push(component);
            }
        }

        info!(
            "Built container with {} gateways and {} components",
            container.gateways.len(),
            container.components.len()
        );

        Ok(container)
    }
}

fn is_postgres_uri(uri: &str) -> bool {
    matches!(uri_scheme(uri), "postgres" | "postgresql")
}

fn uri_scheme(uri: &str) -> &str {
    uri.split_once("://").map(|(scheme, _)| scheme).unwrap_or("")
}

fn create_pool(database_url: &str, max_size: usize) -> std::result::Result<Pool, String> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| format!("Failed to create pool: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn configuration(gateways: &[(&str, GatewaySpec)]) -> MappingConfiguration {
        MappingConfiguration::new(
            gateways
                .iter()
                .map(|(name, spec)| (name.to_string(), spec.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_memory_gateway_datasets() {
        let factory = GatewayContainerFactory::default();
        let container = factory
            .build(&configuration(&[("default", GatewaySpec::memory_fallback())]))
            .unwrap();

        let memory = container.gateway("default").unwrap().as_memory().unwrap();
        memory.insert("users", json!({"id": 1}));
        memory.insert("users", json!({"id": 2}));

        assert_eq!(memory.dataset("users").len(), 2);
        assert_eq!(memory.dataset_names(), vec!["users"]);

        container.disconnect();
        assert!(container.is_disconnected());
        assert!(memory.dataset("users").is_empty());

        // Second call is a no-op
        container.disconnect();
        assert!(container.is_disconnected());
    }

    #[tokio::test]
    async fn test_sql_gateway_builds_lazy_pool() {
        let factory = GatewayContainerFactory::new(3);
        let spec = GatewaySpec::sql("postgres://app@localhost:5432/app", BTreeMap::new());
        let container = factory.build(&configuration(&[("primary", spec)])).unwrap();

        let gateway = container.gateway("primary").unwrap();
        assert_eq!(gateway.adapter(), "sql");
        let pool = gateway.pool().unwrap();
        assert_eq!(pool.status().max_size, 3);

        container.disconnect();
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn test_pool_option_overrides_default_size() {
        let factory = GatewayContainerFactory::new(10);
        let mut options = BTreeMap::new();
        options.insert("pool".to_string(), json!(2));
        let spec = GatewaySpec::sql("postgres://localhost/app", options);
        let container = factory.build(&configuration(&[("primary", spec)])).unwrap();

        assert_eq!(container.gateway("primary").unwrap().pool().unwrap().status().max_size, 2);
    }

    #[test]
    fn test_unsupported_adapters_fail() {
        let factory = GatewayContainerFactory::default();

        let err = factory
            .build(&configuration(&[("files", GatewaySpec::new("yaml", "yaml:///data"))]))
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::UnsupportedAdapter { ref adapter, .. } if adapter == "yaml"));

        let err = factory
            .build(&configuration(&[(
                "legacy",
                GatewaySpec::new("sql", "mysql2://db/legacy"),
            )]))
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::UnsupportedAdapter { ref gateway, .. } if gateway == "legacy"));
    }

    #[tokio::test]
    async fn test_dropping_container_closes_pools() {
        let factory = GatewayContainerFactory::default();
        let spec = GatewaySpec::sql("postgres://localhost/app", BTreeMap::new());
        let container = factory.build(&configuration(&[("primary", spec)])).unwrap();

        let pool = container.gateway("primary").unwrap().pool().unwrap().clone();
        assert!(!pool.is_closed());

        drop(container);
        assert!(pool.is_closed());
    }

    #[test]
    fn test_empty_uri_is_invalid() {
        let err = GatewayContainerFactory::default()
            .build(&configuration(&[("default", GatewaySpec::new("memory", ""))]))
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::InvalidGatewaySpec { ref gateway, .. } if gateway == "default"));
    }

    #[test]
    fn test_duplicate_components_keep_first_root() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        for root in [first.path(), second.path()] {
            fs::create_dir_all(root.join("relations")).unwrap();
            fs::write(root.join("relations/users.rs"), "").unwrap();
        }

        let mut config = configuration(&[("default", GatewaySpec::memory_fallback())]);
        config.auto_register(first.path(), true);
        config.auto_register(second.path(), true);

        let container = GatewayContainerFactory::default().build(&config).unwrap();
        assert_eq!(container.components().len(), 1);
        assert!(container
            .component("relations::users")
            .unwrap()
            .path
            .starts_with(first.path()));
        assert_eq!(container.components_of(ComponentKind::Relation).count(), 1);
    }
}
