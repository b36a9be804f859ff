//! Host framework hook points
//!
//! Each method is meant to be called from the matching point of the host's
//! boot sequence:
//!
//! | Host event | Method |
//! |---|---|
//! | before any user configuration runs | [`Integration::before_configuration`] |
//! | user initializers | [`Integration::load_initializer`] |
//! | before eager loading application code | [`Integration::before_eager_load`] |
//! | every reload (per request in development, once in production) | [`Integration::on_reload`] |
//! | after a pre-forking server forks a worker | [`Integration::after_fork`] |

use crate::container::ContainerFactory;
use crate::error::Result;
use crate::lifecycle::LifecycleCoordinator;
use crate::tasks::DbTask;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Integration<F: ContainerFactory> {
    coordinator: Arc<LifecycleCoordinator<F>>,
    initializer_path: PathBuf,
}

impl<F: ContainerFactory> Integration<F> {
    /// `initializer_path` is resolved against the application root
    pub fn new(coordinator: Arc<LifecycleCoordinator<F>>, initializer_path: impl Into<PathBuf>) -> Self {
        Self {
            coordinator,
            initializer_path: initializer_path.into(),
        }
    }

    pub fn coordinator(&self) -> &Arc<LifecycleCoordinator<F>> {
        &self.coordinator
    }

    /// Give user code an empty configuration to work with
    pub fn before_configuration(&self) {
        self.coordinator.reset_config();
        debug!("Configuration reset before boot");
    }

    /// Apply the optional initializer file. A missing file is not an error.
    pub fn load_initializer(&self) -> Result<()> {
        if self.coordinator.load_initializer(&self.initializer_path)? {
            info!("Applied initializer {}", self.initializer_path.display());
        }
        Ok(())
    }

    /// Drop auto-registered component directories from the host's eager-load list
    pub fn before_eager_load(&self, eager_load_paths: &mut Vec<PathBuf>) {
        let exclusions: HashSet<PathBuf> = self.coordinator.eager_load_exclusions().into_iter().collect();

        let before = eager_load_paths.len();
        eager_load_paths.retain(|path| !exclusions.contains(path));

        debug!(
            "Removed {} component directories from eager loading",
            before - eager_load_paths.len()
        );
    }

    /// Rebuild the process container; the replaced one is disconnected
    pub fn on_reload(&self) -> Result<()> {
        self.coordinator.refresh_process_container()?;
        Ok(())
    }

    /// Forked workers must not share the parent's connections
    pub fn after_fork(&self) {
        self.coordinator.disconnect_process_container();
    }

    /// Database tasks to expose to the host task runner.
    ///
    /// Empty when another ORM is present, since it ships tasks with the same names.
    pub fn db_tasks(&self) -> Vec<DbTask> {
        if self.coordinator.has_connection_source() {
            debug!("Connection source present, database tasks suppressed");
            return Vec::new();
        }
        DbTask::all().to_vec()
    }

    /// Boot sequence for hosts without finer-grained hooks
    pub fn boot(&self, eager_load_paths: &mut Vec<PathBuf>) -> Result<()> {
        self.before_configuration();
        self.load_initializer()?;
        self.before_eager_load(eager_load_paths);
        self.on_reload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewaySpec;
    use crate::container::{Disconnect, GatewayContainerFactory};
    use crate::lifecycle::tests::StaticSource;
    use crate::lifecycle::DEFAULT_GATEWAY;
    use crate::slot::SlotState;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn integration(root: &Path) -> Integration<GatewayContainerFactory> {
        let coordinator = LifecycleCoordinator::new(root, GatewayContainerFactory::default());
        Integration::new(Arc::new(coordinator), "config/initializers/mapping.json")
    }

    #[test]
    fn test_before_eager_load_removes_component_dirs() {
        let integration = integration(Path::new("/srv/app"));
        integration
            .coordinator()
            .configure(|config| config.add_registration_paths(["engines/billing"]));

        let mut eager = vec![
            PathBuf::from("/srv/app/relations"),
            PathBuf::from("/srv/app/controllers"),
            PathBuf::from("/srv/app/engines/billing/mappers"),
            PathBuf::from("/srv/app/models"),
        ];
        integration.before_eager_load(&mut eager);

        assert_eq!(
            eager,
            vec![PathBuf::from("/srv/app/controllers"), PathBuf::from("/srv/app/models")]
        );
    }

    #[test]
    fn test_reload_replaces_and_disconnects() {
        let integration = integration(Path::new("/srv/app"));

        integration.on_reload().unwrap();
        let first = integration.coordinator().container().unwrap();
        integration.on_reload().unwrap();
        let second = integration.coordinator().container().unwrap();

        assert!(first.is_disconnected());
        assert!(!second.is_disconnected());
        assert!(second.gateway(DEFAULT_GATEWAY).is_some());
    }

    #[test]
    fn test_after_fork_disconnects() {
        let integration = integration(Path::new("/srv/app"));
        integration.after_fork();

        integration.on_reload().unwrap();
        let container = integration.coordinator().container().unwrap();
        integration.after_fork();
        integration.after_fork();

        assert!(container.is_disconnected());
        assert_eq!(integration.coordinator().slot().state(), SlotState::Absent);
        container.disconnect();
    }

    #[test]
    fn test_db_tasks_suppressed_with_connection_source() {
        let plain = integration(Path::new("/srv/app"));
        assert_eq!(plain.db_tasks(), DbTask::all().to_vec());

        let coordinator = LifecycleCoordinator::new("/srv/app", GatewayContainerFactory::default())
            .with_connection_source(Box::new(StaticSource(BTreeMap::new())));
        let with_source = Integration::new(Arc::new(coordinator), "config/initializers/mapping.json");
        assert!(with_source.db_tasks().is_empty());
    }

    #[test]
    fn test_boot_applies_initializer() {
        let temp_dir = TempDir::new().unwrap();
        let initializers = temp_dir.path().join("config/initializers");
        fs::create_dir_all(&initializers).unwrap();
        fs::write(
            initializers.join("mapping.json"),
            r#"{"gateways": {"cache": {"adapter": "memory", "uri": "memory://cache"}}}"#,
        )
        .unwrap();

        let integration = integration(temp_dir.path());
        integration
            .coordinator()
            .configure(|config| config.set_gateway("stale", GatewaySpec::memory_fallback()));

        let mut eager = Vec::new();
        integration.boot(&mut eager).unwrap();

        let container = integration.coordinator().container().unwrap();
        assert_eq!(container.gateway_names(), vec!["cache"]);
    }
}
