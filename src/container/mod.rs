//! Container construction
//!
//! [`MappingConfiguration`] is the finalized input handed to a
//! [`ContainerFactory`]; the factory materializes a container holding live
//! gateways and the auto-registered component definitions.

mod gateway;
mod registration;

pub use gateway::{Gateway, GatewayContainer, GatewayContainerFactory, MemoryGateway};
pub use registration::{discover_components, ComponentDefinition, ComponentKind, COMPONENT_DIRS};

use crate::config::GatewaySpec;
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A root scanned for relations, mappers and commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoRegistration {
    pub root: PathBuf,
    pub namespace: bool,
}

/// Gateways plus auto-registration roots, ready to build a container from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingConfiguration {
    gateways: BTreeMap<String, GatewaySpec>,
    auto_registrations: Vec<AutoRegistration>,
}

impl MappingConfiguration {
    pub fn new(gateways: BTreeMap<String, GatewaySpec>) -> Self {
        Self {
            gateways,
            auto_registrations: Vec::new(),
        }
    }

    pub fn auto_register(&mut self, root: impl Into<PathBuf>, namespace: bool) {
        self.auto_registrations.push(AutoRegistration {
            root: root.into(),
            namespace,
        });
    }

    pub fn gateways(&self) -> &BTreeMap<String, GatewaySpec> {
        &self.gateways
    }

    pub fn auto_registrations(&self) -> &[AutoRegistration] {
        &self.auto_registrations
    }
}

/// Releases the connections held by a container
pub trait Disconnect {
    fn disconnect(&self);
}

/// Builds independent containers from a configuration
pub trait ContainerFactory: Send + Sync {
    type Container: Disconnect + Send + Sync;

    fn build(&self, configuration: &MappingConfiguration) -> Result<Self::Container>;
}
