use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Connection source {source_name} failed: {cause}")]
    ConnectionSource { source_name: String, cause: String },

    #[error("Gateway {gateway} is required but was never configured")]
    MissingGatewayConfig { gateway: String },

    #[error("Invalid spec for gateway {gateway}: {cause}")]
    InvalidGatewaySpec { gateway: String, cause: String },

    #[error("Gateway {gateway} uses unsupported adapter: {adapter}")]
    UnsupportedAdapter { gateway: String, adapter: String },

    #[error("Container build failed for gateway {gateway}: {cause}")]
    ContainerBuild { gateway: String, cause: String },

    #[error("Initializer {path} could not be loaded: {cause}")]
    Initializer { path: String, cause: String },

    #[error("Auto-registration failed under {path}: {cause}")]
    Registration { path: String, cause: String },

    #[error("Connection failed to gateway {gateway}: {cause}")]
    ConnectionFailed { gateway: String, cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Short machine-readable tag, used in task output
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::ConnectionSource { .. } => "connection_source",
            BridgeError::MissingGatewayConfig { .. } => "missing_gateway_config",
            BridgeError::InvalidGatewaySpec { .. } => "invalid_gateway_spec",
            BridgeError::UnsupportedAdapter { .. } => "unsupported_adapter",
            BridgeError::ContainerBuild { .. } => "container_build",
            BridgeError::Initializer { .. } => "initializer",
            BridgeError::Registration { .. } => "registration",
            BridgeError::ConnectionFailed { .. } => "connection_failed",
            BridgeError::Internal(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Internal(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        BridgeError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
