//! Argument schemas: validate a raw argument map into [`ModuleArgs`].

use azrec_core::State;
use serde::Serialize;
use serde_json::{json, Map as JsonMap, Value as Json};

use crate::error::{AzureError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    Str,
    Int,
    Bool,
    List,
    Dict,
    Raw,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
    #[serde(skip_serializing_if = "no_choices")]
    pub choices: &'static [&'static str],
}

fn no_choices(c: &&'static [&'static str]) -> bool {
    c.is_empty()
}

impl ArgSpec {
    fn new(name: &'static str, kind: ArgKind) -> Self {
        Self { name, kind, required: false, default: None, choices: &[] }
    }

    pub fn str(name: &'static str) -> Self { Self::new(name, ArgKind::Str) }
    pub fn int(name: &'static str) -> Self { Self::new(name, ArgKind::Int) }
    pub fn bool(name: &'static str) -> Self { Self::new(name, ArgKind::Bool) }
    pub fn list(name: &'static str) -> Self { Self::new(name, ArgKind::List) }
    pub fn dict(name: &'static str) -> Self { Self::new(name, ArgKind::Dict) }
    pub fn raw(name: &'static str) -> Self { Self::new(name, ArgKind::Raw) }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, v: Json) -> Self {
        self.default = Some(v);
        self
    }

    pub fn choices(mut self, c: &'static [&'static str]) -> Self {
        self.choices = c;
        self
    }

    fn coerce(&self, v: &Json) -> Result<Json> {
        let bad = || AzureError::InvalidArgument(format!("argument '{}' expects {:?}, got {}", self.name, self.kind, v));
        let out = match (self.kind, v) {
            (ArgKind::Str, Json::String(_)) => v.clone(),
            (ArgKind::Str, Json::Number(n)) => json!(n.to_string()),
            (ArgKind::Str, Json::Bool(b)) => json!(b.to_string()),
            (ArgKind::Int, Json::Number(n)) if n.is_i64() || n.is_u64() => v.clone(),
            (ArgKind::Int, Json::String(s)) => json!(s.trim().parse::<i64>().map_err(|_| bad())?),
            (ArgKind::Bool, Json::Bool(_)) => v.clone(),
            (ArgKind::Bool, Json::String(s)) => match s.to_lowercase().as_str() {
                "yes" | "true" | "on" | "1" => json!(true),
                "no" | "false" | "off" | "0" => json!(false),
                _ => return Err(bad()),
            },
            (ArgKind::List, Json::Array(_)) => v.clone(),
            (ArgKind::Dict, Json::Object(_)) => v.clone(),
            (ArgKind::Raw, _) => v.clone(),
            _ => return Err(bad()),
        };
        if !self.choices.is_empty() {
            let values: Vec<&Json> = match &out {
                Json::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for item in values {
                let ok = item.as_str().is_some_and(|s| self.choices.contains(&s));
                if !ok {
                    return Err(AzureError::InvalidArgument(format!(
                        "value of '{}' must be one of: {}, got: {}",
                        self.name,
                        self.choices.join(", "),
                        item
                    )));
                }
            }
        }
        Ok(out)
    }
}

/// `state: present|absent`, accepted by every module.
pub fn state_arg() -> ArgSpec {
    ArgSpec::str("state").default(json!("present")).choices(&["present", "absent"])
}

/// Validated arguments of one module invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleArgs(JsonMap<String, Json>);

impl ModuleArgs {
    /// Checks `raw` against `specs`; unknown names, missing required values
    /// and wrong types are errors. Defaults are filled in.
    pub fn validate(specs: &[ArgSpec], raw: &JsonMap<String, Json>) -> Result<Self> {
        if let Some(unknown) = raw.keys().find(|k| !specs.iter().any(|s| s.name == k.as_str())) {
            let mut names: Vec<&str> = specs.iter().map(|s| s.name).collect();
            names.sort_unstable();
            return Err(AzureError::InvalidArgument(format!(
                "unsupported parameter '{}', supported parameters: {}",
                unknown,
                names.join(", ")
            )));
        }
        let mut out = JsonMap::new();
        for spec in specs {
            match raw.get(spec.name).filter(|v| !v.is_null()) {
                Some(v) => {
                    out.insert(spec.name.to_string(), spec.coerce(v)?);
                }
                None => {
                    if let Some(d) = &spec.default {
                        out.insert(spec.name.to_string(), d.clone());
                    }
                }
            }
        }
        if out.get("state").and_then(Json::as_str) != Some("absent") {
            if let Some(missing) = specs.iter().find(|s| s.required && !out.contains_key(s.name)) {
                return Err(AzureError::InvalidArgument(format!("missing required argument: {}", missing.name)));
            }
        } else if let Some(missing) = specs
            .iter()
            .find(|s| s.required && is_key_arg(s.name) && !out.contains_key(s.name))
        {
            return Err(AzureError::InvalidArgument(format!("missing required argument: {}", missing.name)));
        }
        Ok(ModuleArgs(out))
    }

    pub fn from_map(map: JsonMap<String, Json>) -> Self {
        ModuleArgs(map)
    }

    pub fn get(&self, name: &str) -> Option<&Json> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Json::as_str)
    }

    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.str(name)
            .ok_or_else(|| AzureError::InvalidArgument(format!("missing required argument: {}", name)))
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Json::as_i64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Json::as_bool)
    }

    pub fn state(&self) -> State {
        match self.str("state") {
            Some("absent") => State::Absent,
            _ => State::Present,
        }
    }

    pub fn insert(&mut self, name: &str, value: Json) {
        self.0.insert(name.to_string(), value);
    }

    pub fn as_map(&self) -> &JsonMap<String, Json> {
        &self.0
    }
}

/// Arguments that address the resource and therefore stay required when
/// deleting; everything else is only needed to create.
fn is_key_arg(name: &str) -> bool {
    matches!(name, "name" | "resource_group" | "scope" | "lab_name" | "server_name" | "policy_set_name")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn specs() -> Vec<ArgSpec> {
        vec![
            ArgSpec::str("resource_group").required(),
            ArgSpec::str("name").required(),
            ArgSpec::str("location").required(),
            ArgSpec::int("capacity").default(json!(2)),
            ArgSpec::bool("enabled"),
            ArgSpec::str("tier").choices(&["basic", "standard"]),
            state_arg(),
        ]
    }

    fn raw(v: Json) -> JsonMap<String, Json> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn fills_defaults_and_coerces() {
        let args = ModuleArgs::validate(
            &specs(),
            &raw(json!({"resource_group": "rg", "name": "n", "location": "eastus", "enabled": "yes"})),
        )
        .unwrap();
        assert_eq!(args.int("capacity"), Some(2));
        assert_eq!(args.bool("enabled"), Some(true));
        assert_eq!(args.str("state"), Some("present"));
        assert_eq!(args.state(), State::Present);
    }

    #[test]
    fn missing_required_is_an_error() {
        let err = ModuleArgs::validate(&specs(), &raw(json!({"resource_group": "rg", "name": "n"}))).unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: missing required argument: location");
    }

    #[test]
    fn absent_only_needs_key_arguments() {
        let args =
            ModuleArgs::validate(&specs(), &raw(json!({"resource_group": "rg", "name": "n", "state": "absent"}))).unwrap();
        assert_eq!(args.state(), State::Absent);
        assert!(ModuleArgs::validate(&specs(), &raw(json!({"name": "n", "state": "absent"}))).is_err());
    }

    #[test]
    fn rejects_invalid_choice_and_unknown_names() {
        let base = json!({"resource_group": "rg", "name": "n", "location": "x"});
        let mut bad = raw(base.clone());
        bad.insert("tier".into(), json!("premium"));
        assert!(ModuleArgs::validate(&specs(), &bad).unwrap_err().to_string().contains("must be one of"));

        let mut unknown = raw(base);
        unknown.insert("colour".into(), json!("red"));
        assert!(ModuleArgs::validate(&specs(), &unknown)
            .unwrap_err()
            .to_string()
            .contains("unsupported parameter 'colour'"));
    }

    #[test]
    fn rejects_wrong_types() {
        let r = raw(json!({"resource_group": "rg", "name": "n", "location": "x", "capacity": "lots"}));
        assert!(ModuleArgs::validate(&specs(), &r).is_err());
    }
}
