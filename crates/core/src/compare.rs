//! Structural "does old satisfy new" comparison of JSON trees.
//!
//! `new` is a partial description of the desired resource: `null` anywhere in
//! it means "no opinion", and keys that only exist on the observed side are
//! ignored. Lists are compared order-insensitively by sorting both sides first.

use serde::Serialize;
use serde_json::{Map as JsonMap, Value as Json};
use std::cmp::Ordering;

/// First mismatch found while comparing, kept for logging and module output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffReport {
    pub entries: Vec<DiffEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub path: String,
    pub reason: String,
    pub new: Json,
    pub old: Json,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, path: &str, reason: &str, new: &Json, old: &Json) {
        self.entries.push(DiffEntry {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            reason: reason.to_string(),
            new: new.clone(),
            old: old.clone(),
        });
    }

    /// Human readable one-line description of the first mismatch.
    pub fn describe(&self) -> Option<String> {
        self.entries
            .first()
            .map(|e| format!("changed [{}] {}: {} != {}", e.path, e.reason, e.new, e.old))
    }
}

/// Returns true when `old` already satisfies `new`.
pub fn default_compare(new: &Json, old: &Json) -> bool {
    let mut report = DiffReport::default();
    compare_at(new, old, "", &mut report)
}

/// Same as [`default_compare`], recording the first mismatch into `report`.
pub fn compare_with_report(new: &Json, old: &Json, report: &mut DiffReport) -> bool {
    compare_at(new, old, "", report)
}

fn compare_at(new: &Json, old: &Json, path: &str, report: &mut DiffReport) -> bool {
    match new {
        Json::Null => true,
        Json::Object(n) => {
            let Some(o) = old.as_object() else {
                report.push(path, "expected a mapping", new, old);
                return false;
            };
            for (k, v) in n {
                let sub = format!("{}/{}", path, k);
                if !compare_at(v, o.get(k).unwrap_or(&Json::Null), &sub, report) {
                    return false;
                }
            }
            true
        }
        Json::Array(n) => {
            let Some(o) = old.as_array() else {
                report.push(path, "expected a list", new, old);
                return false;
            };
            if n.len() != o.len() {
                report.push(path, "list length differs", new, old);
                return false;
            }
            if n.is_empty() {
                return true;
            }
            let (n, o) = sorted_pair(n, o);
            let sub = format!("{}/*", path);
            n.iter()
                .zip(o.iter())
                .all(|(nv, ov)| compare_at(nv, ov, &sub, report))
        }
        _ => {
            if scalars_equal(new, old, path) {
                true
            } else {
                report.push(path, "value differs", new, old);
                false
            }
        }
    }
}

fn scalars_equal(new: &Json, old: &Json, path: &str) -> bool {
    match (new, old) {
        (Json::String(n), Json::String(o)) if path == "/location" => {
            normalize_location(n) == normalize_location(o)
        }
        (Json::Number(n), Json::Number(o)) => match (n.as_f64(), o.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => n == o,
        },
        _ => new == old,
    }
}

/// "East US" and "eastus" name the same region.
pub fn normalize_location(s: &str) -> String {
    s.replace(' ', "").to_lowercase()
}

/// Sorts both sides so that positionally compared elements line up.
///
/// Lists of mappings sort by `id` when both first elements carry one, then by
/// `name`, then by the alphabetically first key of the observed element.
fn sorted_pair<'a>(new: &'a [Json], old: &'a [Json]) -> (Vec<&'a Json>, Vec<&'a Json>) {
    let mut n: Vec<&Json> = new.iter().collect();
    let mut o: Vec<&Json> = old.iter().collect();
    match sort_key(new[0].as_object(), old[0].as_object()) {
        Some(key) => {
            let by_key = |a: &&Json, b: &&Json| {
                let av = a.get(&key).unwrap_or(&Json::Null);
                let bv = b.get(&key).unwrap_or(&Json::Null);
                total_cmp(av, bv)
            };
            n.sort_by(by_key);
            o.sort_by(by_key);
        }
        None => {
            n.sort_by(|a, b| total_cmp(a, b));
            o.sort_by(|a, b| total_cmp(a, b));
        }
    }
    (n, o)
}

/// Key used to sort a list of mappings: `id`, then `name`, when both sides
/// carry it. Otherwise the first key of the old element, which is the
/// alphabetically smallest one since `serde_json::Map` keeps keys sorted.
fn sort_key(new_first: Option<&JsonMap<String, Json>>, old_first: Option<&JsonMap<String, Json>>) -> Option<String> {
    let old_first = old_first?;
    let in_both = |k: &str| old_first.contains_key(k) && new_first.is_some_and(|n| n.contains_key(k));
    if in_both("id") {
        Some("id".to_string())
    } else if in_both("name") {
        Some("name".to_string())
    } else {
        old_first.keys().next().cloned()
    }
}

fn kind_rank(v: &Json) -> u8 {
    match v {
        Json::Null => 0,
        Json::Bool(_) => 1,
        Json::Number(_) => 2,
        Json::String(_) => 3,
        Json::Array(_) => 4,
        Json::Object(_) => 5,
    }
}

/// Deterministic ordering over arbitrary JSON values.
pub fn total_cmp(a: &Json, b: &Json) -> Ordering {
    match (a, b) {
        (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
        (Json::Number(x), Json::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Json::String(x), Json::String(y)) => x.cmp(y),
        (Json::Array(x), Json::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let c = total_cmp(l, r);
                if c != Ordering::Equal {
                    return c;
                }
            }
            x.len().cmp(&y.len())
        }
        (Json::Object(x), Json::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let c = lk.cmp(rk).then_with(|| total_cmp(lv, rv));
                if c != Ordering::Equal {
                    return c;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}
