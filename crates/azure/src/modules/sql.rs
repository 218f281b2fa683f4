//! Azure SQL servers, databases and firewall rules.

use serde_json::{json, Map as JsonMap, Value as Json};

use crate::error::Result;
use crate::module::{enabled, envelope, map_enum, parent_of, pick, tracked_args, ModuleSpec};
use crate::schema::{ArgSpec, ModuleArgs};

pub fn all() -> Vec<ModuleSpec> {
    vec![server(), database(), firewall_rule()]
}

pub fn server() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_sqlserver",
        "Microsoft.Sql/servers",
        "2015-05-01-preview",
        rg_path!("Microsoft.Sql/servers/{name}"),
    )
    .describe("Manage a SQL server")
    .args(tracked_args())
    .args([
        ArgSpec::str("version").default(json!("12.0")),
        ArgSpec::str("identity").choices(&["SystemAssigned"]),
        ArgSpec::str("admin_username"),
        ArgSpec::str("admin_password"),
    ])
    .body(|args, _| {
        let mut props = JsonMap::new();
        if let Some(v) = args.str("version") {
            props.insert("version".into(), json!(v));
        }
        if let Some(u) = args.str("admin_username") {
            props.insert("administratorLogin".into(), json!(u));
        }
        if let Some(p) = args.str("admin_password") {
            props.insert("administratorLoginPassword".into(), json!(p));
        }
        let mut body = envelope(args, props);
        if let Some(identity) = args.str("identity") {
            body["identity"] = json!({ "type": identity });
        }
        Ok(body)
    })
    .write_only(&["/properties/administratorLoginPassword"])
}

const CREATE_MODES: &[&str] = &[
    "default",
    "copy",
    "secondary",
    "point_in_time_restore",
    "restore",
    "recovery",
    "restore_external_backup",
    "restore_external_backup_secondary",
    "restore_long_term_retention_backup",
    "online_secondary",
];

const EDITIONS: &[(&str, &str)] = &[
    ("web", "Web"),
    ("business", "Business"),
    ("basic", "Basic"),
    ("standard", "Standard"),
    ("premium", "Premium"),
    ("free", "Free"),
    ("stretch", "Stretch"),
    ("data_warehouse", "DataWarehouse"),
    ("system", "System"),
    ("system2", "System2"),
];

pub fn database() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_sqldatabase",
        "Microsoft.Sql/servers/databases",
        "2017-10-01-preview",
        rg_path!("Microsoft.Sql/servers/{server_name}/databases/{name}"),
    )
    .describe("Manage a SQL database")
    .args(tracked_args())
    .args([
        ArgSpec::str("server_name").required(),
        ArgSpec::str("collation"),
        ArgSpec::str("create_mode").choices(CREATE_MODES),
        ArgSpec::str("source_database_id"),
        ArgSpec::str("source_database_deletion_date"),
        ArgSpec::str("restore_point_in_time"),
        ArgSpec::str("recovery_services_recovery_point_resource_id"),
        ArgSpec::str("edition").choices(&[
            "web", "business", "basic", "standard", "premium", "free", "stretch", "data_warehouse", "system", "system2",
        ]),
        ArgSpec::dict("sku"),
        ArgSpec::int("max_size_bytes"),
        ArgSpec::str("elastic_pool_name"),
        ArgSpec::bool("read_scale"),
        ArgSpec::str("sample_name").choices(&["adventure_works_lt"]),
        ArgSpec::bool("zone_redundant"),
    ])
    .body(database_body)
    .write_only(&[
        "/properties/createMode",
        "/properties/sourceDatabaseId",
        "/properties/sourceDatabaseDeletionDate",
        "/properties/restorePointInTime",
        "/properties/recoveryServicesRecoveryPointId",
        "/properties/sampleName",
    ])
}

fn database_body(args: &ModuleArgs, path: &str) -> Result<Json> {
    let mut props = pick(
        args,
        &[
            "collation",
            "source_database_id",
            "source_database_deletion_date",
            "restore_point_in_time",
            "max_size_bytes",
            "zone_redundant",
        ],
    );
    if let Some(mode) = args.str("create_mode") {
        props.insert("createMode".into(), json!(crate::casing::snake_to_pascal(mode)));
    }
    if let Some(id) = args.str("recovery_services_recovery_point_resource_id") {
        props.insert("recoveryServicesRecoveryPointId".into(), json!(id));
    }
    if let Some(pool) = args.str("elastic_pool_name") {
        props.insert("elasticPoolId".into(), json!(format!("{}/elasticPools/{}", parent_of(path, 1), pool)));
    }
    if let Some(v) = enabled(args.bool("read_scale")) {
        props.insert("readScale".into(), v);
    }
    if args.str("sample_name").is_some() {
        props.insert("sampleName".into(), json!("AdventureWorksLT"));
    }
    let mut body = envelope(args, props);
    match (args.get("sku").and_then(Json::as_object), args.str("edition")) {
        (Some(sku), _) => body["sku"] = crate::casing::to_camel_tree(&Json::Object(sku.clone())),
        (None, Some(edition)) => body["sku"] = json!({ "tier": map_enum(edition, EDITIONS)? }),
        (None, None) => {}
    }
    Ok(body)
}

pub fn firewall_rule() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_sqlfirewallrule",
        "Microsoft.Sql/servers/firewallRules",
        "2015-05-01-preview",
        rg_path!("Microsoft.Sql/servers/{server_name}/firewallRules/{name}"),
    )
    .describe("Manage a SQL server firewall rule")
    .args([
        ArgSpec::str("resource_group").required(),
        ArgSpec::str("server_name").required(),
        ArgSpec::str("name").required(),
        ArgSpec::str("start_ip_address"),
        ArgSpec::str("end_ip_address"),
    ])
    .body(|args, _| Ok(json!({ "properties": pick(args, &["start_ip_address", "end_ip_address"]) })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SRV: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/srv";

    fn args(spec: &ModuleSpec, v: Json) -> ModuleArgs {
        ModuleArgs::validate(&spec.args, v.as_object().unwrap()).unwrap()
    }

    #[test]
    fn database_body_maps_edition_and_pool() {
        let spec = database();
        let a = args(
            &spec,
            json!({
                "resource_group": "rg", "server_name": "srv", "name": "db", "location": "eastus",
                "edition": "premium", "elastic_pool_name": "pool1", "read_scale": false,
                "create_mode": "point_in_time_restore", "max_size_bytes": "1073741824"
            }),
        );
        let path = spec.resolve_path("s", &a).unwrap();
        assert_eq!(path, format!("{}/databases/db", SRV));
        let b = (spec.body)(&a, &path).unwrap();
        assert_eq!(b["sku"], json!({"tier": "Premium"}));
        assert_eq!(b["properties"]["elasticPoolId"], json!(format!("{}/elasticPools/pool1", SRV)));
        assert_eq!(b["properties"]["readScale"], json!("Disabled"));
        assert_eq!(b["properties"]["createMode"], json!("PointInTimeRestore"));
        assert_eq!(b["properties"]["maxSizeBytes"], json!(1073741824));

        let d = spec.desired(&a, &path).unwrap();
        assert_eq!(d["properties"]["createMode"], Json::Null);
    }

    #[test]
    fn explicit_sku_wins_over_edition() {
        let spec = database();
        let a = args(&spec, json!({"resource_group": "rg", "server_name": "srv", "name": "db", "edition": "basic", "sku": {"name": "S0", "tier": "Standard"}}));
        let b = (spec.body)(&a, "").unwrap();
        assert_eq!(b["sku"], json!({"name": "S0", "tier": "Standard"}));
    }

    #[test]
    fn server_identity_and_password() {
        let spec = server();
        let a = args(&spec, json!({"resource_group": "rg", "name": "srv", "location": "eastus", "admin_username": "sa", "admin_password": "pw", "identity": "SystemAssigned"}));
        let b = (spec.body)(&a, "").unwrap();
        assert_eq!(b["identity"], json!({"type": "SystemAssigned"}));
        assert_eq!(b["properties"]["version"], json!("12.0"));
        assert_eq!(spec.desired(&a, "").unwrap()["properties"]["administratorLoginPassword"], Json::Null);
    }

    #[test]
    fn firewall_rule_body() {
        let spec = firewall_rule();
        let a = args(&spec, json!({"resource_group": "rg", "server_name": "srv", "name": "fw", "start_ip_address": "10.0.0.0", "end_ip_address": "10.0.0.255"}));
        assert_eq!(
            (spec.body)(&a, "").unwrap(),
            json!({"properties": {"startIpAddress": "10.0.0.0", "endIpAddress": "10.0.0.255"}})
        );
    }
}
