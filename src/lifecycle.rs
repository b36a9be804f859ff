//! Lifecycle coordinator
//!
//! Merges user configuration with gateways inferred from a connection source,
//! builds containers from the result and keeps the process-wide container
//! slot up to date across reloads.

use crate::config::{ConfigStore, GatewaySpec, InitializerFile};
use crate::container::{ContainerFactory, Disconnect, MappingConfiguration, COMPONENT_DIRS};
use crate::error::{BridgeError, Result};
use crate::slot::ContainerSlot;
use crate::source::ConnectionSource;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

pub const DEFAULT_GATEWAY: &str = "default";

pub struct LifecycleCoordinator<F: ContainerFactory> {
    app_root: PathBuf,
    config: RwLock<Option<ConfigStore>>,
    source: Option<Box<dyn ConnectionSource>>,
    factory: F,
    slot: Arc<ContainerSlot<F::Container>>,
    refresh_lock: Mutex<()>,
}

impl<F: ContainerFactory> LifecycleCoordinator<F> {
    /// A relative `app_root` is resolved against the current directory
    pub fn new(app_root: impl Into<PathBuf>, factory: F) -> Self {
        let app_root = app_root.into();
        let app_root = std::path::absolute(&app_root).unwrap_or(app_root);

        Self {
            app_root,
            config: RwLock::new(None),
            source: None,
            factory,
            slot: Arc::new(ContainerSlot::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Infer gateways from another ORM's connections
    pub fn with_connection_source(mut self, source: Box<dyn ConnectionSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use an externally owned container slot
    pub fn with_slot(mut self, slot: Arc<ContainerSlot<F::Container>>) -> Self {
        self.slot = slot;
        self
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    pub fn slot(&self) -> Arc<ContainerSlot<F::Container>> {
        Arc::clone(&self.slot)
    }

    pub fn has_connection_source(&self) -> bool {
        self.source.is_some()
    }

    fn with_config<R>(&self, f: impl FnOnce(&mut ConfigStore) -> R) -> R {
        let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
        f(guard.get_or_insert_with(ConfigStore::new))
    }

    /// Start over with an empty configuration
    pub fn reset_config(&self) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(ConfigStore::new());
    }

    /// Hand the configuration to `setup` for mutation.
    ///
    /// `setup` works on a copy that replaces the stored configuration once it
    /// returns, so it may call back into the coordinator.
    ///
    /// ```
    /// use mapping_bridge::{ConfigStore, GatewayContainerFactory, GatewaySpec, LifecycleCoordinator};
    ///
    /// let coordinator = LifecycleCoordinator::new("/srv/app", GatewayContainerFactory::default());
    /// coordinator.configure(|config: &mut ConfigStore| {
    ///     config.set_gateway("default", GatewaySpec::new("memory", "memory://cache"));
    ///     config.add_registration_paths(["engines/billing"]);
    /// });
    /// ```
    pub fn configure<G>(&self, setup: G)
    where
        G: FnOnce(&mut ConfigStore),
    {
        let mut store = self.config();
        setup(&mut store);
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(store);
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> ConfigStore {
        self.with_config(|config| config.clone())
    }

    /// Merge an initializer file located relative to the application root.
    /// Returns `false` when there is no such file.
    pub fn load_initializer(&self, relative: &Path) -> Result<bool> {
        let path = self.app_root.join(relative);
        match InitializerFile::load(&path)? {
            Some(file) => {
                self.with_config(|config| config.merge_initializer(file));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Final gateway mapping used to build a container.
    ///
    /// Explicit gateways are kept as-is; connections reported by the source
    /// fill in the names that are still free. With nothing configured at all
    /// an in-memory `default` gateway is installed and a warning is logged.
    pub fn resolve_gateways(&self) -> Result<BTreeMap<String, GatewaySpec>> {
        let inferred = match &self.source {
            Some(source) => Some((source.name().to_string(), source.list_connections()?)),
            None => None,
        };

        let gateways = self.with_config(|config| {
            if let Some((source_name, connections)) = inferred {
                for (name, connection) in connections {
                    let spec = GatewaySpec::sql(connection.uri, connection.options);
                    if config.default_gateway(&name, spec) {
                        debug!("Inferred gateway {} from {}", name, source_name);
                    }
                }
            }

            if config.gateways().is_empty() {
                warn!(
                    "It seems that no gateways are configured, falling back to in-memory gateway '{}'",
                    DEFAULT_GATEWAY
                );
                config.set_gateway(DEFAULT_GATEWAY, GatewaySpec::memory_fallback());
            }

            config.gateways().clone()
        });

        Ok(gateways)
    }

    /// Configured registration roots followed by the application root.
    /// Relative entries are relative to the application root.
    pub fn registration_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.with_config(|config| config.registration_paths().to_vec());
        paths.push(self.app_root.clone());
        paths
    }

    /// Component directories the host loader must leave to auto-registration
    pub fn eager_load_exclusions(&self) -> Vec<PathBuf> {
        self.registration_paths()
            .iter()
            .flat_map(|root| {
                let root = self.app_root.join(root);
                COMPONENT_DIRS.iter().map(move |dir| root.join(dir))
            })
            .collect()
    }

    /// Build a fresh container from the current configuration.
    ///
    /// Each call produces an independent container; installing it is up to the caller.
    pub fn build_container(&self) -> Result<F::Container> {
        let gateways = self.resolve_gateways()?;

        let required = self.with_config(|config| config.required_gateways().clone());
        if let Some(missing) = required.iter().find(|name| !gateways.contains_key(*name)) {
            return Err(BridgeError::MissingGatewayConfig {
                gateway: missing.clone(),
            });
        }

        let mut configuration = MappingConfiguration::new(gateways);
        let mut seen = HashSet::new();
        for path in self.registration_paths() {
            let root = self.app_root.join(path);
            if seen.insert(root.clone()) {
                configuration.auto_register(root, true);
            }
        }

        self.factory.build(&configuration)
    }

    /// Build a new container, install it, then disconnect the one it replaced.
    ///
    /// The replaced container is returned already disconnected. On a build
    /// failure the installed container stays in place.
    pub fn refresh_process_container(&self) -> Result<Option<Arc<F::Container>>> {
        let _guard = self.refresh_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let next = Arc::new(self.build_container()?);
        let previous = self.slot.replace(next);

        if let Some(previous) = &previous {
            previous.disconnect();
            debug!("Disconnected replaced container");
        }

        info!("Container refreshed");
        Ok(previous)
    }

    /// Disconnect and remove the installed container. No-op when none is installed.
    pub fn disconnect_process_container(&self) {
        let _guard = self.refresh_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(container) = self.slot.take() {
            container.disconnect();
            info!("Container disconnected");
        }
    }

    /// The currently installed container.
    ///
    /// The returned handle is disconnected by the next reload; fetch it again
    /// per request instead of holding it across one.
    pub fn container(&self) -> Option<Arc<F::Container>> {
        self.slot.current()
    }
}
