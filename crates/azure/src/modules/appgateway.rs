//! `azure_rm_appgateway`: application gateways.
//!
//! Sub-resources (listeners, pools, rules...) refer to each other by name in
//! the arguments; the body builder turns those names into ARM ids under the
//! gateway's own path.

use serde_json::{json, Map as JsonMap, Value as Json};

use crate::error::{AzureError, Result};
use crate::module::{envelope, map_enum, sub_ref, tracked_args, ModuleSpec};
use crate::schema::{ArgSpec, ModuleArgs};

const SKU_NAMES: &[(&str, &str)] = &[
    ("standard_small", "Standard_Small"),
    ("standard_medium", "Standard_Medium"),
    ("standard_large", "Standard_Large"),
    ("waf_medium", "WAF_Medium"),
    ("waf_large", "WAF_Large"),
    ("standard_v2", "Standard_v2"),
    ("waf_v2", "WAF_v2"),
];
const SKU_TIERS: &[(&str, &str)] = &[
    ("standard", "Standard"),
    ("waf", "WAF"),
    ("standard_v2", "Standard_v2"),
    ("waf_v2", "WAF_v2"),
];
const PROTOCOLS: &[(&str, &str)] = &[("http", "Http"), ("https", "Https")];
const SSL_PROTOCOLS: &[(&str, &str)] = &[("tls_v1_0", "TLSv1_0"), ("tls_v1_1", "TLSv1_1"), ("tls_v1_2", "TLSv1_2")];
const SSL_POLICY_TYPES: &[(&str, &str)] = &[("predefined", "Predefined"), ("custom", "Custom")];
const ALLOCATION: &[(&str, &str)] = &[("dynamic", "Dynamic"), ("static", "Static")];
const AFFINITY: &[(&str, &str)] = &[("enabled", "Enabled"), ("disabled", "Disabled")];
const RULE_TYPES: &[(&str, &str)] = &[("basic", "Basic"), ("path_based_routing", "PathBasedRouting")];

pub fn appgateway() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_appgateway",
        "Microsoft.Network/applicationGateways",
        "2018-04-01",
        rg_path!("Microsoft.Network/applicationGateways/{name}"),
    )
    .describe("Manage an application gateway")
    .args(tracked_args())
    .args([
        ArgSpec::dict("sku"),
        ArgSpec::dict("ssl_policy"),
        ArgSpec::list("gateway_ip_configurations"),
        ArgSpec::list("authentication_certificates"),
        ArgSpec::list("ssl_certificates"),
        ArgSpec::list("frontend_ip_configurations"),
        ArgSpec::list("frontend_ports"),
        ArgSpec::list("backend_address_pools"),
        ArgSpec::list("backend_http_settings_collection"),
        ArgSpec::list("http_listeners"),
        ArgSpec::list("request_routing_rules"),
    ])
    .write_only(&["/properties/sslCertificates", "/properties/authenticationCertificates"])
    .body(body)
}

fn items<'a>(args: &'a ModuleArgs, name: &str) -> impl Iterator<Item = &'a JsonMap<String, Json>> {
    args.get(name)
        .and_then(Json::as_array)
        .into_iter()
        .flatten()
        .filter_map(Json::as_object)
}

fn enum_field(item: &JsonMap<String, Json>, key: &str, table: &[(&str, &str)]) -> Result<Option<Json>> {
    match item.get(key).and_then(Json::as_str) {
        Some(v) => map_enum(v, table)
            .map(|s| Some(json!(s)))
            .map_err(|_| AzureError::InvalidArgument(format!("unsupported {} '{}'", key, v))),
        None => Ok(None),
    }
}

fn named(item: &JsonMap<String, Json>, properties: JsonMap<String, Json>) -> Json {
    json!({ "name": item.get("name").cloned().unwrap_or(Json::Null), "properties": properties })
}

fn put(props: &mut JsonMap<String, Json>, key: &str, v: Option<Json>) {
    if let Some(v) = v.filter(|v| !v.is_null()) {
        props.insert(key.to_string(), v);
    }
}

fn body(args: &ModuleArgs, path: &str) -> Result<Json> {
    let mut props = JsonMap::new();

    if let Some(sku) = args.get("sku").and_then(Json::as_object) {
        let mut out = JsonMap::new();
        put(&mut out, "name", enum_field(sku, "name", SKU_NAMES)?);
        put(&mut out, "tier", enum_field(sku, "tier", SKU_TIERS)?);
        put(&mut out, "capacity", sku.get("capacity").cloned());
        props.insert("sku".into(), Json::Object(out));
    }

    if let Some(policy) = args.get("ssl_policy").and_then(Json::as_object) {
        let mut out = JsonMap::new();
        put(&mut out, "policyType", enum_field(policy, "policy_type", SSL_POLICY_TYPES)?);
        put(&mut out, "policyName", policy.get("policy_name").cloned());
        put(&mut out, "minProtocolVersion", enum_field(policy, "min_protocol_version", SSL_PROTOCOLS)?);
        if let Some(disabled) = policy.get("disabled_ssl_protocols").and_then(Json::as_array) {
            let mapped = disabled
                .iter()
                .filter_map(Json::as_str)
                .map(|p| map_enum(p, SSL_PROTOCOLS).map(Json::String))
                .collect::<Result<Vec<_>>>()?;
            out.insert("disabledSslProtocols".into(), Json::Array(mapped));
        }
        put(&mut out, "cipherSuites", policy.get("cipher_suites").cloned());
        props.insert("sslPolicy".into(), Json::Object(out));
    }

    let mut list = |key: &str, v: Vec<Json>| {
        if args.get(key).is_some() {
            props.insert(key_for(key).to_string(), Json::Array(v));
        }
    };

    let mut gw_ip = Vec::new();
    for item in items(args, "gateway_ip_configurations") {
        let mut p = JsonMap::new();
        put(&mut p, "subnet", item.get("subnet").map(|s| json!({ "id": s })));
        gw_ip.push(named(item, p));
    }
    list("gateway_ip_configurations", gw_ip);

    let mut certs = Vec::new();
    for item in items(args, "authentication_certificates") {
        let mut p = JsonMap::new();
        put(&mut p, "data", item.get("data").cloned());
        certs.push(named(item, p));
    }
    list("authentication_certificates", certs);

    let mut ssl = Vec::new();
    for item in items(args, "ssl_certificates") {
        let mut p = JsonMap::new();
        put(&mut p, "data", item.get("data").cloned());
        put(&mut p, "password", item.get("password").cloned());
        ssl.push(named(item, p));
    }
    list("ssl_certificates", ssl);

    let mut fe_ip = Vec::new();
    for item in items(args, "frontend_ip_configurations") {
        let mut p = JsonMap::new();
        put(&mut p, "privateIPAddress", item.get("private_ip_address").cloned());
        put(&mut p, "privateIPAllocationMethod", enum_field(item, "private_ip_allocation_method", ALLOCATION)?);
        put(&mut p, "subnet", item.get("subnet").map(|s| json!({ "id": s })));
        put(&mut p, "publicIPAddress", item.get("public_ip_address").map(|s| json!({ "id": s })));
        fe_ip.push(named(item, p));
    }
    list("frontend_ip_configurations", fe_ip);

    let mut ports = Vec::new();
    for item in items(args, "frontend_ports") {
        let mut p = JsonMap::new();
        put(&mut p, "port", item.get("port").cloned());
        ports.push(named(item, p));
    }
    list("frontend_ports", ports);

    let mut pools = Vec::new();
    for item in items(args, "backend_address_pools") {
        let mut p = JsonMap::new();
        if let Some(addrs) = item.get("backend_addresses").and_then(Json::as_array) {
            let addrs = addrs.iter().map(crate::casing::to_camel_tree).collect();
            p.insert("backendAddresses".into(), Json::Array(addrs));
        }
        pools.push(named(item, p));
    }
    list("backend_address_pools", pools);

    let mut settings = Vec::new();
    for item in items(args, "backend_http_settings_collection") {
        let mut p = JsonMap::new();
        put(&mut p, "port", item.get("port").cloned());
        put(&mut p, "protocol", enum_field(item, "protocol", PROTOCOLS)?);
        put(&mut p, "cookieBasedAffinity", enum_field(item, "cookie_based_affinity", AFFINITY)?);
        put(&mut p, "requestTimeout", item.get("request_timeout").cloned());
        if let Some(certs) = item.get("authentication_certificates").and_then(Json::as_array) {
            let refs = certs.iter().map(|c| sub_ref(path, "authenticationCertificates", c)).collect();
            p.insert("authenticationCertificates".into(), Json::Array(refs));
        }
        settings.push(named(item, p));
    }
    list("backend_http_settings_collection", settings);

    let mut listeners = Vec::new();
    for item in items(args, "http_listeners") {
        let mut p = JsonMap::new();
        put(&mut p, "frontendIPConfiguration", item.get("frontend_ip_configuration").map(|n| sub_ref(path, "frontendIPConfigurations", n)));
        put(&mut p, "frontendPort", item.get("frontend_port").map(|n| sub_ref(path, "frontendPorts", n)));
        put(&mut p, "protocol", enum_field(item, "protocol", PROTOCOLS)?);
        put(&mut p, "sslCertificate", item.get("ssl_certificate").map(|n| sub_ref(path, "sslCertificates", n)));
        put(&mut p, "hostName", item.get("host_name").cloned());
        put(&mut p, "requireServerNameIndication", item.get("require_server_name_indication").cloned());
        listeners.push(named(item, p));
    }
    list("http_listeners", listeners);

    let mut rules = Vec::new();
    for item in items(args, "request_routing_rules") {
        let mut p = JsonMap::new();
        put(&mut p, "ruleType", enum_field(item, "rule_type", RULE_TYPES)?);
        put(&mut p, "backendAddressPool", item.get("backend_address_pool").map(|n| sub_ref(path, "backendAddressPools", n)));
        put(&mut p, "backendHttpSettings", item.get("backend_http_settings").map(|n| sub_ref(path, "backendHttpSettingsCollection", n)));
        put(&mut p, "httpListener", item.get("http_listener").map(|n| sub_ref(path, "httpListeners", n)));
        rules.push(named(item, p));
    }
    list("request_routing_rules", rules);

    Ok(envelope(args, props))
}

/// ARM spells "IP" in upper case inside these collection names.
fn key_for(arg: &str) -> &'static str {
    match arg {
        "gateway_ip_configurations" => "gatewayIPConfigurations",
        "authentication_certificates" => "authenticationCertificates",
        "ssl_certificates" => "sslCertificates",
        "frontend_ip_configurations" => "frontendIPConfigurations",
        "frontend_ports" => "frontendPorts",
        "backend_address_pools" => "backendAddressPools",
        "backend_http_settings_collection" => "backendHttpSettingsCollection",
        "http_listeners" => "httpListeners",
        _ => "requestRoutingRules",
    }
}
