//! Deprecated aliases kept for callers written against older releases.

use crate::config::{ConfigStore, GatewaySpec};
use std::collections::BTreeMap;
use tracing::warn;

/// Former name of [`ConfigStore::gateways_mut`].
#[deprecated(note = "use ConfigStore::gateways_mut")]
pub fn repositories(config: &mut ConfigStore) -> &mut BTreeMap<String, GatewaySpec> {
    warn!("`repositories` is deprecated and will be removed, use `gateways` instead");
    config.gateways_mut()
}
