//! Mapping Bridge Library
//!
//! Wires a data-mapping container into a host application's boot lifecycle:
//! gateway resolution (explicit, inferred from another ORM, or an in-memory
//! fallback), auto-registration roots, and container rebuilds on every reload.

pub mod compat;
pub mod config;
pub mod container;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod slot;
pub mod source;
pub mod tasks;

pub use config::{ConfigStore, GatewaySpec, Settings};
pub use container::{ContainerFactory, Disconnect, GatewayContainer, GatewayContainerFactory};
pub use error::{BridgeError, Result};
pub use hooks::Integration;
pub use lifecycle::LifecycleCoordinator;
pub use slot::{ContainerSlot, SlotState};
pub use source::{ConnectionSource, ConnectionSpec};
