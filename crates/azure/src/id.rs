use regex::Regex;
use std::sync::OnceLock;

use crate::error::{AzureError, Result};

/// Parsed ARM resource id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmId {
    pub subscription_id: String,
    pub resource_group: Option<String>,
    pub namespace: Option<String>,
    /// `(type, name)` pairs, outermost first.
    pub chain: Vec<(String, String)>,
}

fn head() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^/subscriptions/([^/]+)(?:/resourceGroups/([^/]+))?(?:/providers/([^/]+)((?:/[^/]+/[^/]+)*))?/?$")
            .expect("static regex")
    })
}

impl ArmId {
    pub fn parse(id: &str) -> Result<Self> {
        let caps = head()
            .captures(id)
            .ok_or_else(|| AzureError::InvalidArgument(format!("'{}' is not an Azure resource id", id)))?;
        let rest = caps.get(4).map(|m| m.as_str()).unwrap_or("");
        let parts: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let chain = parts.chunks(2).map(|c| (c[0].to_string(), c[1].to_string())).collect();
        Ok(ArmId {
            subscription_id: caps[1].to_string(),
            resource_group: caps.get(2).map(|m| m.as_str().to_string()),
            namespace: caps.get(3).map(|m| m.as_str().to_string()),
            chain,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.chain.last().map(|(_, n)| n.as_str())
    }

    /// Full resource type, e.g. `Microsoft.Sql/servers/databases`.
    pub fn resource_type(&self) -> Option<String> {
        let ns = self.namespace.as_ref()?;
        let types: Vec<&str> = self.chain.iter().map(|(t, _)| t.as_str()).collect();
        Some(format!("{}/{}", ns, types.join("/")))
    }
}
