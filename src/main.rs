//! Task runner for the mapping bridge
//!
//! Usage:
//!   mapping-bridge              # list available tasks
//!   mapping-bridge db:gateways
//!   APP_ENV=production mapping-bridge db:check

use mapping_bridge::tasks::{run_task, DbTask};
use mapping_bridge::{GatewayContainerFactory, Integration, LifecycleCoordinator, Settings};
use std::env;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    let dotenv = dotenvy::dotenv();

    let settings = Settings::from_env()?;

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(&settings.log_dir).unwrap_or_else(|e| {
        eprintln!(
            "Warning: Could not create log directory {}: {}",
            settings.log_dir.display(),
            e
        );
    });

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &settings.log_dir, "mapping-bridge.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Console output plus JSON file output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mapping_bridge=debug")),
        )
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking),
        )
        .init();

    debug!("Logging initialized - log directory: {}", settings.log_dir.display());

    if let Err(e) = dotenv {
        debug!("No .env file found or error loading it: {}", e);
    }

    let app_root = settings
        .app_root
        .canonicalize()
        .unwrap_or_else(|_| settings.app_root.clone());

    info!("Application root: {}", app_root.display());
    info!("Environment: {}", settings.environment);

    let mut coordinator = LifecycleCoordinator::new(
        app_root,
        GatewayContainerFactory::new(settings.max_connections_per_gateway),
    );
    if let Some(source) = settings.connection_source() {
        info!("Inferring gateways from {}", source.name());
        coordinator = coordinator.with_connection_source(source);
    }

    let integration = Integration::new(Arc::new(coordinator), settings.initializer_path.clone());
    integration.before_configuration();
    integration.load_initializer()?;

    let tasks = integration.db_tasks();
    let args: Vec<String> = env::args().collect();

    let Some(task_name) = args.get(1) else {
        if tasks.is_empty() {
            println!("Database tasks are provided by the companion ORM in this application.");
        } else {
            println!("Available tasks:");
            for task in &tasks {
                println!("  {:<14} {}", task.name(), task.description());
            }
        }
        return Ok(());
    };

    let task = match DbTask::select(task_name, &tasks) {
        Ok(task) => task,
        Err(rejection) => {
            warn!("{}", rejection);
            eprintln!("{}", rejection);
            // Flush the file log before exiting; process::exit skips destructors
            drop(guard);
            std::process::exit(rejection.exit_code());
        }
    };

    let outcome = run_task(task, &integration).await;
    integration.coordinator().disconnect_process_container();

    match outcome {
        Ok(report) => {
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            error!("{} failed ({}): {}", task, e.kind(), e);
            Err(e.into())
        }
    }
}
