use crate::error::{BridgeError, Result};
use crate::source::{ConnectionSource, DatabaseYmlSource, EnvConnectionSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ADAPTER_SQL: &str = "sql";
pub const ADAPTER_MEMORY: &str = "memory";

/// Connection settings for one named gateway.
///
/// Deserializes from either `{ "adapter", "uri", "options" }` or the positional
/// `[adapter, uri]` / `[adapter, uri, options]` forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawGatewaySpec")]
pub struct GatewaySpec {
    pub adapter: String,
    pub uri: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGatewaySpec {
    Named {
        adapter: String,
        uri: String,
        #[serde(default)]
        options: BTreeMap<String, Value>,
    },
    WithOptions(String, String, BTreeMap<String, Value>),
    Positional(String, String),
}

impl From<RawGatewaySpec> for GatewaySpec {
    fn from(raw: RawGatewaySpec) -> Self {
        match raw {
            RawGatewaySpec::Named { adapter, uri, options } => Self { adapter, uri, options },
            RawGatewaySpec::WithOptions(adapter, uri, options) => Self { adapter, uri, options },
            RawGatewaySpec::Positional(adapter, uri) => Self::new(adapter, uri),
        }
    }
}

impl GatewaySpec {
    pub fn new(adapter: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            uri: uri.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_options(mut self, options: BTreeMap<String, Value>) -> Self {
        self.options = options;
        self
    }

    /// SQL gateway inferred from another ORM's connection settings
    pub fn sql(uri: impl Into<String>, options: BTreeMap<String, Value>) -> Self {
        Self::new(ADAPTER_SQL, uri).with_options(options)
    }

    /// Throwaway in-memory gateway used when nothing else is configured
    pub fn memory_fallback() -> Self {
        Self::new(ADAPTER_MEMORY, "memory://test")
    }
}

/// User-declared gateway and auto-registration settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigStore {
    gateways: BTreeMap<String, GatewaySpec>,
    registration_paths: Vec<PathBuf>,
    required_gateways: BTreeSet<String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the gateway stored under `name`
    pub fn set_gateway(&mut self, name: impl Into<String>, spec: GatewaySpec) {
        self.gateways.insert(name.into(), spec);
    }

    /// Insert only when `name` is not configured yet. Returns whether it was inserted.
    pub(crate) fn default_gateway(&mut self, name: &str, spec: GatewaySpec) -> bool {
        if self.gateways.contains_key(name) {
            return false;
        }
        self.gateways.insert(name.to_string(), spec);
        true
    }

    pub fn gateways(&self) -> &BTreeMap<String, GatewaySpec> {
        &self.gateways
    }

    pub fn gateways_mut(&mut self) -> &mut BTreeMap<String, GatewaySpec> {
        &mut self.gateways
    }

    /// Append roots to scan for relations, mappers and commands. Duplicates are kept.
    pub fn add_registration_paths<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.registration_paths.extend(paths.into_iter().map(Into::into));
    }

    pub fn registration_paths(&self) -> &[PathBuf] {
        &self.registration_paths
    }

    /// Mark a gateway as mandatory; building a container fails without it
    pub fn require_gateway(&mut self, name: impl Into<String>) {
        self.required_gateways.insert(name.into());
    }

    pub fn required_gateways(&self) -> &BTreeSet<String> {
        &self.required_gateways
    }

    /// Apply the settings found in an initializer file
    pub fn merge_initializer(&mut self, file: InitializerFile) {
        for (name, spec) in file.gateways {
            self.set_gateway(name, spec);
        }
        self.add_registration_paths(file.registration_paths);
        for name in file.required_gateways {
            self.require_gateway(name);
        }
    }
}

/// Contents of the optional boot-time initializer file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializerFile {
    #[serde(default)]
    pub gateways: BTreeMap<String, GatewaySpec>,
    #[serde(default)]
    pub registration_paths: Vec<PathBuf>,
    #[serde(default)]
    pub required_gateways: Vec<String>,
}

impl InitializerFile {
    /// Read the initializer at `path`. A missing file yields `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No initializer at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(BridgeError::Initializer {
                    path: path.display().to_string(),
                    cause: e.to_string(),
                })
            }
        };

        let file: InitializerFile =
            serde_json::from_str(&content).map_err(|e| BridgeError::Initializer {
                path: path.display().to_string(),
                cause: e.to_string(),
            })?;

        info!(
            "Loaded initializer {} ({} gateways, {} registration paths)",
            path.display(),
            file.gateways.len(),
            file.registration_paths.len()
        );
        Ok(Some(file))
    }
}

/// Process settings read from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    pub app_root: PathBuf,
    pub environment: String,
    pub initializer_path: PathBuf,
    pub database_config: PathBuf,
    pub max_connections_per_gateway: usize,
    pub log_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let app_root = env::var("APP_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let initializer_path = env::var("MAPPING_INITIALIZER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/initializers/mapping.json"));

        let database_config = env::var("DATABASE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/database.yml"));

        let max_connections_per_gateway = env::var("MAX_CONNECTIONS_PER_GATEWAY")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let log_dir = env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./log"));

        Ok(Settings {
            app_root,
            environment,
            initializer_path,
            database_config,
            max_connections_per_gateway,
            log_dir,
        })
    }

    /// Initializer location resolved against the application root
    pub fn initializer_file(&self) -> PathBuf {
        self.app_root.join(&self.initializer_path)
    }

    pub fn database_config_file(&self) -> PathBuf {
        self.app_root.join(&self.database_config)
    }

    /// Pick the other-ORM connection source present in this environment, if any
    pub fn connection_source(&self) -> Option<Box<dyn ConnectionSource>> {
        let database_config = self.database_config_file();
        if database_config.is_file() {
            return Some(Box::new(DatabaseYmlSource::new(
                database_config,
                &self.environment,
                &self.app_root,
            )));
        }

        if env::var("DATABASE_URL").is_ok() || env::var("DB_NAME").is_ok() {
            return Some(Box::new(EnvConnectionSource::new()));
        }

        None
    }
}
