//! Role assignments and custom role definitions.

use serde_json::{json, Map as JsonMap, Value as Json};

use crate::casing::to_camel_tree;
use crate::module::{pick, ModuleSpec};
use crate::schema::ArgSpec;

pub fn all() -> Vec<ModuleSpec> {
    vec![role_assignment(), role_definition()]
}

/// Assignments are immutable in ARM; an existing one is never updated.
pub fn role_assignment() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_roleassignment",
        "Microsoft.Authorization/roleAssignments",
        "2018-01-01-preview",
        "{scope}/providers/Microsoft.Authorization/roleAssignments/{name}",
    )
    .describe("Manage a role assignment")
    .args([
        ArgSpec::str("scope").required(),
        ArgSpec::str("name").required(),
        ArgSpec::str("role_definition_id"),
        ArgSpec::str("assignee_object_id"),
        ArgSpec::str("principal_type").choices(&["User", "Group", "ServicePrincipal"]),
    ])
    .body(|args, _| {
        let mut props = pick(args, &["role_definition_id", "principal_type"]);
        if let Some(id) = args.get("assignee_object_id") {
            props.insert("principalId".into(), id.clone());
        }
        Ok(json!({ "properties": props }))
    })
    .existence_only()
}

pub fn role_definition() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_roledefinition",
        "Microsoft.Authorization/roleDefinitions",
        "2018-01-01-preview",
        "{scope}/providers/Microsoft.Authorization/roleDefinitions/{name}",
    )
    .describe("Manage a custom role definition")
    .args([
        ArgSpec::str("scope").required(),
        ArgSpec::str("name").required(),
        ArgSpec::str("role_name"),
        ArgSpec::str("description"),
        ArgSpec::list("permissions"),
        ArgSpec::list("assignable_scopes"),
    ])
    .body(|args, _| {
        let mut props = JsonMap::new();
        if let Some(n) = args.get("role_name") {
            props.insert("roleName".into(), n.clone());
        }
        if let Some(d) = args.get("description") {
            props.insert("description".into(), d.clone());
        }
        props.insert("type".into(), json!("CustomRole"));
        if let Some(p) = args.get("permissions") {
            props.insert("permissions".into(), to_camel_tree(p));
        }
        let scopes = match args.get("assignable_scopes") {
            Some(s) => s.clone(),
            None => json!([args.require_str("scope")?]),
        };
        props.insert("assignableScopes".into(), scopes);
        Ok(json!({ "properties": Json::Object(props) }))
    })
}
