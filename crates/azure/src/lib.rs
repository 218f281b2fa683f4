//! Azure Resource Manager backend: REST client, credentials and the module catalogue.

pub mod auth;
pub mod casing;
pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod module;
pub mod modules;
pub mod schema;

pub use client::ArmClient;
pub use config::{AzureConfig, Credentials};
pub use error::{AzureError, Result};
pub use id::ArmId;
pub use module::{ArmResource, ModuleSpec};
pub use modules::Registry;
pub use schema::{ArgKind, ArgSpec, ModuleArgs};

use serde_json::{Map as JsonMap, Value as Json};
use std::sync::Arc;

/// Binds one module invocation to a client, looking the module up by name.
pub fn resource(
    registry: &Registry,
    client: Arc<ArmClient>,
    module: &str,
    args: &JsonMap<String, Json>,
) -> Result<ArmResource> {
    let spec = registry
        .get(module)
        .ok_or_else(|| AzureError::InvalidArgument(format!("unknown module '{}'", module)))?;
    ArmResource::new(spec, client, args)
}
