use std::collections::BTreeMap;
use std::sync::Arc;

use crate::module::ModuleSpec;

/// Path under `/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/`.
macro_rules! rg_path {
    ($($p:tt)+) => {
        concat!("/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/", $($p)+)
    };
}

pub mod appgateway;
pub mod authorization;
pub mod devtestlab;
pub mod rdbms;
pub mod sql;

/// All modules known to the binary, by name.
pub struct Registry {
    modules: BTreeMap<&'static str, Arc<ModuleSpec>>,
}

impl Registry {
    pub fn builtin() -> Self {
        let mut specs = vec![appgateway::appgateway()];
        specs.extend(devtestlab::all());
        specs.extend(rdbms::all());
        specs.extend(sql::all());
        specs.extend(authorization::all());
        Self { modules: specs.into_iter().map(|s| (s.name, Arc::new(s))).collect() }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModuleSpec>> {
        self.modules.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModuleSpec>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
