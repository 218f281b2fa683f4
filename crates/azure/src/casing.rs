//! Key casing between module arguments (snake_case) and ARM bodies (camelCase).

use serde_json::{Map as JsonMap, Value as Json};

pub fn snake_to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub fn snake_to_pascal(s: &str) -> String {
    let camel = snake_to_camel(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => camel,
    }
}

pub fn camel_to_snake(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Rewrites every mapping key in the tree with `f`; values are left alone.
pub fn transform_keys(v: &Json, f: &dyn Fn(&str) -> String) -> Json {
    match v {
        Json::Object(m) => {
            let mut out = JsonMap::new();
            for (k, val) in m {
                out.insert(f(k), transform_keys(val, f));
            }
            Json::Object(out)
        }
        Json::Array(items) => Json::Array(items.iter().map(|i| transform_keys(i, f)).collect()),
        other => other.clone(),
    }
}

pub fn to_camel_tree(v: &Json) -> Json {
    transform_keys(v, &snake_to_camel)
}

pub fn to_snake_tree(v: &Json) -> Json {
    transform_keys(v, &camel_to_snake)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snake_and_camel() {
        assert_eq!(snake_to_camel("resource_group"), "resourceGroup");
        assert_eq!(snake_to_camel("start_ip_address"), "startIpAddress");
        assert_eq!(snake_to_camel("name"), "name");
        assert_eq!(snake_to_pascal("lab_vms_shutdown"), "LabVmsShutdown");
        assert_eq!(camel_to_snake("provisioningState"), "provisioning_state");
        assert_eq!(camel_to_snake("startIpAddress"), "start_ip_address");
        assert_eq!(camel_to_snake("HTTPListeners"), "http_listeners");
        assert_eq!(camel_to_snake("maxSizeBytes"), "max_size_bytes");
        assert_eq!(camel_to_snake("id"), "id");
    }

    #[test]
    fn trees_are_rewritten_recursively() {
        let v = json!({"ssl_policy": {"min_protocol_version": "TLSv1_2"}, "rules": [{"rule_type": "Basic"}]});
        assert_eq!(
            to_camel_tree(&v),
            json!({"sslPolicy": {"minProtocolVersion": "TLSv1_2"}, "rules": [{"ruleType": "Basic"}]})
        );
        assert_eq!(to_snake_tree(&to_camel_tree(&v)), v);
    }
}
