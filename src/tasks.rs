//! Database tasks offered to the host task runner

use crate::container::GatewayContainerFactory;
use crate::error::{BridgeError, Result};
use crate::hooks::Integration;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbTask {
    Setup,
    Gateways,
    Check,
}

impl DbTask {
    pub fn all() -> &'static [DbTask] {
        &[DbTask::Setup, DbTask::Gateways, DbTask::Check]
    }

    pub fn name(&self) -> &'static str {
        match self {
            DbTask::Setup => "db:setup",
            DbTask::Gateways => "db:gateways",
            DbTask::Check => "db:check",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DbTask::Setup => "Build the container and report what was registered",
            DbTask::Gateways => "Print the resolved gateway configuration",
            DbTask::Check => "Connect to every SQL gateway",
        }
    }

    pub fn parse(name: &str) -> Option<DbTask> {
        DbTask::all().iter().copied().find(|task| task.name() == name)
    }

    /// Resolve `name` against the tasks currently offered
    pub fn select(name: &str, available: &[DbTask]) -> std::result::Result<DbTask, TaskRejection> {
        match DbTask::parse(name) {
            Some(task) if available.contains(&task) => Ok(task),
            Some(task) => Err(TaskRejection::Suppressed(task)),
            None => Err(TaskRejection::Unknown(name.to_string())),
        }
    }
}

/// Why a requested task will not run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRejection {
    Unknown(String),
    Suppressed(DbTask),
}

impl TaskRejection {
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskRejection::Unknown(_) => 1,
            TaskRejection::Suppressed(_) => 2,
        }
    }
}

impl fmt::Display for TaskRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRejection::Unknown(name) => write!(f, "Unknown task: {}", name),
            TaskRejection::Suppressed(task) => write!(
                f,
                "{} is suppressed because a companion ORM provides database tasks",
                task
            ),
        }
    }
}

impl fmt::Display for DbTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run `task` and return its report
pub async fn run_task(task: DbTask, integration: &Integration<GatewayContainerFactory>) -> Result<String> {
    let coordinator = integration.coordinator();

    match task {
        DbTask::Setup => {
            integration.on_reload()?;
            let container = coordinator
                .container()
                .ok_or_else(|| BridgeError::Internal("No container installed after setup".to_string()))?;

            Ok(format!(
                "Container ready: {} gateways ({}), {} components",
                container.gateway_names().len(),
                container.gateway_names().join(", "),
                container.components().len()
            ))
        }
        DbTask::Gateways => {
            let gateways = coordinator.resolve_gateways()?;
            serde_json::to_string_pretty(&gateways)
                .map_err(|e| BridgeError::Internal(format!("Failed to serialize gateways: {}", e)))
        }
        DbTask::Check => {
            integration.on_reload()?;
            let container = coordinator
                .container()
                .ok_or_else(|| BridgeError::Internal("No container installed after setup".to_string()))?;

            let checked = container.check_connections().await?;
            Ok(format!("{} SQL gateways reachable", checked.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleCoordinator;
    use std::sync::Arc;

    fn integration() -> Integration<GatewayContainerFactory> {
        let coordinator = LifecycleCoordinator::new("/srv/app", GatewayContainerFactory::default());
        Integration::new(Arc::new(coordinator), "config/initializers/mapping.json")
    }

    #[test]
    fn test_parse_task_names() {
        assert_eq!(DbTask::parse("db:setup"), Some(DbTask::Setup));
        assert_eq!(DbTask::parse("db:check"), Some(DbTask::Check));
        assert_eq!(DbTask::parse("db:migrate"), None);
        assert_eq!(DbTask::Gateways.to_string(), "db:gateways");
    }

    #[test]
    fn test_select_rejects_unknown_and_suppressed() {
        assert_eq!(DbTask::select("db:check", DbTask::all()), Ok(DbTask::Check));

        let unknown = DbTask::select("db:migrate", DbTask::all()).unwrap_err();
        assert_eq!(unknown, TaskRejection::Unknown("db:migrate".to_string()));
        assert_eq!(unknown.exit_code(), 1);

        let suppressed = DbTask::select("db:setup", &[]).unwrap_err();
        assert_eq!(suppressed, TaskRejection::Suppressed(DbTask::Setup));
        assert_eq!(suppressed.exit_code(), 2);
        assert_eq!(
            suppressed.to_string(),
            "db:setup is suppressed because a companion ORM provides database tasks"
        );
    }

    #[tokio::test]
    async fn test_setup_reports_container() {
        let integration = integration();
        let report = run_task(DbTask::Setup, &integration).await.unwrap();
        assert_eq!(report, "Container ready: 1 gateways (default), 0 components");
    }

    #[tokio::test]
    async fn test_gateways_prints_resolved_specs() {
        let integration = integration();
        let report = run_task(DbTask::Gateways, &integration).await.unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(parsed["default"]["adapter"], "memory");
        assert_eq!(parsed["default"]["uri"], "memory://test");
    }

    #[tokio::test]
    async fn test_check_skips_memory_gateways() {
        let integration = integration();
        let report = run_task(DbTask::Check, &integration).await.unwrap();
        assert_eq!(report, "0 SQL gateways reachable");
    }
}
