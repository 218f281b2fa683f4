//! Azure Database for MySQL, PostgreSQL and MariaDB.
//!
//! The three services share one resource model; only the provider namespace,
//! API version and accepted server versions differ.

use serde_json::{json, Map as JsonMap, Value as Json};

use crate::error::Result;
use crate::module::{enabled, envelope, map_enum, pick, tracked_args, ModuleSpec};
use crate::schema::{ArgSpec, ModuleArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    MySql,
    PostgreSql,
    MariaDb,
}

impl Flavor {
    pub const ALL: [Flavor; 3] = [Flavor::MySql, Flavor::PostgreSql, Flavor::MariaDb];

    fn versions(self) -> &'static [&'static str] {
        match self {
            Flavor::MySql => &["5.6", "5.7", "8.0"],
            Flavor::PostgreSql => &["9.5", "9.6", "10", "11"],
            Flavor::MariaDb => &["10.2", "10.3"],
        }
    }

    fn api_version(self) -> &'static str {
        match self {
            Flavor::MariaDb => "2018-06-01",
            _ => "2017-12-01",
        }
    }
}

/// Per-flavor names and paths, spelled out so they stay `&'static str`.
struct Names {
    server: &'static str,
    database: &'static str,
    firewall: &'static str,
    configuration: &'static str,
    server_type: &'static str,
    database_type: &'static str,
    firewall_type: &'static str,
    configuration_type: &'static str,
    server_path: &'static str,
    database_path: &'static str,
    firewall_path: &'static str,
    configuration_path: &'static str,
}

macro_rules! names {
    ($short:literal, $ns:literal) => {
        Names {
            server: concat!("azure_rm_", $short, "server"),
            database: concat!("azure_rm_", $short, "database"),
            firewall: concat!("azure_rm_", $short, "firewallrule"),
            configuration: concat!("azure_rm_", $short, "configuration"),
            server_type: concat!($ns, "/servers"),
            database_type: concat!($ns, "/servers/databases"),
            firewall_type: concat!($ns, "/servers/firewallRules"),
            configuration_type: concat!($ns, "/servers/configurations"),
            server_path: rg_path!(concat!($ns, "/servers/{name}")),
            database_path: rg_path!(concat!($ns, "/servers/{server_name}/databases/{name}")),
            firewall_path: rg_path!(concat!($ns, "/servers/{server_name}/firewallRules/{name}")),
            configuration_path: rg_path!(concat!($ns, "/servers/{server_name}/configurations/{name}")),
        }
    };
}

fn names(flavor: Flavor) -> Names {
    match flavor {
        Flavor::MySql => names!("mysql", "Microsoft.DBforMySQL"),
        Flavor::PostgreSql => names!("postgresql", "Microsoft.DBforPostgreSQL"),
        Flavor::MariaDb => names!("mariadb", "Microsoft.DBforMariaDB"),
    }
}

pub fn all() -> Vec<ModuleSpec> {
    Flavor::ALL
        .into_iter()
        .flat_map(|f| [server(f), database(f), firewall_rule(f), configuration(f)])
        .collect()
}

fn server_args() -> Vec<ArgSpec> {
    vec![
        ArgSpec::str("resource_group").required(),
        ArgSpec::str("server_name").required(),
        ArgSpec::str("name").required(),
    ]
}

pub fn server(flavor: Flavor) -> ModuleSpec {
    let n = names(flavor);
    ModuleSpec::new(n.server, n.server_type, flavor.api_version(), n.server_path)
        .describe("Manage a managed database server")
        .args(tracked_args())
        .args([
            ArgSpec::dict("sku"),
            ArgSpec::int("storage_mb"),
            ArgSpec::str("version").choices(flavor.versions()),
            ArgSpec::bool("enforce_ssl").default(json!(false)),
            ArgSpec::str("admin_username"),
            ArgSpec::str("admin_password"),
            ArgSpec::str("create_mode").default(json!("default")).choices(&["default"]),
        ])
        .body(server_body)
        .write_only(&["/properties/administratorLoginPassword", "/properties/createMode"])
}

const SKU_TIERS: &[(&str, &str)] = &[
    ("basic", "Basic"),
    ("general_purpose", "GeneralPurpose"),
    ("memory_optimized", "MemoryOptimized"),
];

fn server_body(args: &ModuleArgs, _path: &str) -> Result<Json> {
    let mut props = JsonMap::new();
    props.insert("createMode".into(), json!(crate::casing::snake_to_pascal(args.str("create_mode").unwrap_or("default"))));
    if let Some(mb) = args.int("storage_mb") {
        props.insert("storageProfile".into(), json!({ "storageMB": mb }));
    }
    if let Some(v) = args.str("version") {
        props.insert("version".into(), json!(v));
    }
    if let Some(v) = enabled(args.bool("enforce_ssl")) {
        props.insert("sslEnforcement".into(), v);
    }
    if let Some(u) = args.str("admin_username") {
        props.insert("administratorLogin".into(), json!(u));
    }
    if let Some(p) = args.str("admin_password") {
        props.insert("administratorLoginPassword".into(), json!(p));
    }
    let mut body = envelope(args, props);
    if let Some(sku) = args.get("sku").and_then(Json::as_object) {
        let mut out = JsonMap::new();
        for (k, v) in sku {
            let v = match (k.as_str(), v.as_str()) {
                ("tier", Some(t)) => json!(map_enum(t, SKU_TIERS).unwrap_or_else(|_| t.to_string())),
                _ => v.clone(),
            };
            out.insert(crate::casing::snake_to_camel(k), v);
        }
        body["sku"] = Json::Object(out);
    }
    Ok(body)
}

pub fn database(flavor: Flavor) -> ModuleSpec {
    let n = names(flavor);
    ModuleSpec::new(n.database, n.database_type, flavor.api_version(), n.database_path)
        .describe("Manage a database on a managed database server")
        .args(server_args())
        .args([ArgSpec::str("charset"), ArgSpec::str("collation")])
        .body(|args, _| Ok(json!({ "properties": pick(args, &["charset", "collation"]) })))
}

pub fn firewall_rule(flavor: Flavor) -> ModuleSpec {
    let n = names(flavor);
    ModuleSpec::new(n.firewall, n.firewall_type, flavor.api_version(), n.firewall_path)
        .describe("Manage a server firewall rule")
        .args(server_args())
        .args([
            ArgSpec::str("start_ip_address").required(),
            ArgSpec::str("end_ip_address").required(),
        ])
        .body(|args, _| Ok(json!({ "properties": pick(args, &["start_ip_address", "end_ip_address"]) })))
}

/// Server parameters cannot be deleted; `absent` resets them to the system default.
pub fn configuration(flavor: Flavor) -> ModuleSpec {
    let n = names(flavor);
    ModuleSpec::new(n.configuration, n.configuration_type, flavor.api_version(), n.configuration_path)
        .describe("Manage a server configuration parameter")
        .args(server_args())
        .args([ArgSpec::str("value").required()])
        .body(|args, _| {
            Ok(json!({ "properties": { "value": args.require_str("value")?, "source": "user-override" } }))
        })
        .reset_on_absent(|_, _| Ok(json!({ "properties": { "source": "system-default" } })))
}
