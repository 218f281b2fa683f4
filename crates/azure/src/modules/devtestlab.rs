//! DevTest Labs: labs and the entities that live inside them.
//!
//! Deletes of lab entities return before the entity is gone, so every module
//! here confirms deletion by polling.

use serde_json::{json, Map as JsonMap, Value as Json};

use crate::error::{AzureError, Result};
use crate::module::{enabled, envelope, map_enum, parent_of, pick, scope_of, ModuleSpec};
use crate::schema::{ArgSpec, ModuleArgs};

const API: &str = "2018-09-15";

fn lab_args() -> Vec<ArgSpec> {
    vec![
        ArgSpec::str("resource_group").required(),
        ArgSpec::str("lab_name").required(),
        ArgSpec::str("name").required(),
    ]
}

pub fn all() -> Vec<ModuleSpec> {
    vec![lab(), virtual_network(), policy(), schedule(), artifact_source(), custom_image()]
}

pub fn lab() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_devtestlab",
        "Microsoft.DevTestLab/labs",
        API,
        rg_path!("Microsoft.DevTestLab/labs/{name}"),
    )
    .describe("Manage a DevTest lab")
    .args(crate::module::tracked_args())
    .args([
        ArgSpec::str("storage_type").choices(&["standard", "premium"]),
        ArgSpec::bool("premium_data_disks"),
    ])
    .body(|args, _| {
        let mut props = JsonMap::new();
        if let Some(t) = args.str("storage_type") {
            props.insert("labStorageType".into(), json!(map_enum(t, &[("standard", "Standard"), ("premium", "Premium")])?));
        }
        if let Some(v) = enabled(args.bool("premium_data_disks")) {
            props.insert("premiumDataDisks".into(), v);
        }
        Ok(envelope(args, props))
    })
    .confirm_delete()
}

pub fn virtual_network() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_devtestlabvirtualnetwork",
        "Microsoft.DevTestLab/labs/virtualnetworks",
        API,
        rg_path!("Microsoft.DevTestLab/labs/{lab_name}/virtualnetworks/{name}"),
    )
    .describe("Manage a DevTest lab virtual network")
    .args(lab_args())
    .args([ArgSpec::str("location"), ArgSpec::str("description"), ArgSpec::dict("tags")])
    .body(|args, path| {
        let mut props = pick(args, &["description"]);
        let vnet = format!(
            "{}/providers/Microsoft.Network/virtualNetworks/{}",
            scope_of(path),
            args.require_str("name")?
        );
        props.insert("externalProviderResourceId".into(), json!(vnet));
        Ok(envelope(args, props))
    })
    .confirm_delete()
}

const FACTS: &[(&str, &str)] = &[
    ("user_owned_lab_vm_count", "UserOwnedLabVmCount"),
    ("user_owned_lab_premium_vm_count", "UserOwnedLabPremiumVmCount"),
    ("lab_vm_count", "LabVmCount"),
    ("lab_premium_vm_count", "LabPremiumVmCount"),
    ("lab_vm_size", "LabVmSize"),
    ("gallery_image", "GalleryImage"),
    ("user_owned_lab_vm_count_in_subnet", "UserOwnedLabVmCountInSubnet"),
    ("lab_target_cost", "LabTargetCost"),
];

/// Facts whose threshold is a single numeric cap.
const MAX_VALUE_FACTS: &[&str] = &[
    "user_owned_lab_vm_count",
    "user_owned_lab_premium_vm_count",
    "lab_vm_count",
    "lab_premium_vm_count",
    "user_owned_lab_vm_count_in_subnet",
    "lab_target_cost",
];

pub fn policy() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_devtestlabpolicy",
        "Microsoft.DevTestLab/labs/policysets/policies",
        API,
        rg_path!("Microsoft.DevTestLab/labs/{lab_name}/policysets/{policy_set_name}/policies/{name}"),
    )
    .describe("Manage a DevTest lab policy")
    .args(lab_args())
    .args([
        ArgSpec::str("policy_set_name").default(json!("default")),
        ArgSpec::str("fact_name").required().choices(&[
            "user_owned_lab_vm_count",
            "user_owned_lab_premium_vm_count",
            "lab_vm_count",
            "lab_premium_vm_count",
            "lab_vm_size",
            "gallery_image",
            "user_owned_lab_vm_count_in_subnet",
            "lab_target_cost",
        ]),
        ArgSpec::raw("threshold").required(),
        ArgSpec::str("description"),
        ArgSpec::str("location"),
        ArgSpec::dict("tags"),
    ])
    .body(policy_body)
    .confirm_delete()
}

/// Count and cost facts cap a number; every other fact lists allowed values.
fn policy_body(args: &ModuleArgs, _path: &str) -> Result<Json> {
    let fact = args.require_str("fact_name")?;
    let threshold = args.get("threshold").cloned().unwrap_or(Json::Null);
    let (evaluator, threshold) = if MAX_VALUE_FACTS.contains(&fact) {
        let n = match &threshold {
            Json::Number(n) => n.to_string(),
            Json::String(s) if s.parse::<f64>().is_ok() => s.clone(),
            other => {
                return Err(AzureError::InvalidArgument(format!("threshold for {} must be a number, got {}", fact, other)))
            }
        };
        ("MaxValuePolicy", n)
    } else {
        let values = match threshold {
            Json::Array(items) => items,
            Json::Null => Vec::new(),
            single => vec![single],
        };
        ("AllowedValuesPolicy", serde_json::to_string(&values)?)
    };
    let mut props = pick(args, &["description"]);
    props.insert("factName".into(), json!(map_enum(fact, FACTS)?));
    props.insert("evaluatorType".into(), json!(evaluator));
    props.insert("threshold".into(), json!(threshold));
    props.insert("status".into(), json!("Enabled"));
    Ok(envelope(args, props))
}

pub fn schedule() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_devtestlabschedule",
        "Microsoft.DevTestLab/labs/schedules",
        API,
        rg_path!("Microsoft.DevTestLab/labs/{lab_name}/schedules/{schedule_name}"),
    )
    .describe("Manage a DevTest lab auto-start or auto-shutdown schedule")
    .args([
        ArgSpec::str("resource_group").required(),
        ArgSpec::str("lab_name").required(),
        ArgSpec::str("name").required().choices(&["lab_vms_shutdown", "lab_vms_startup"]),
        ArgSpec::str("time"),
        ArgSpec::str("time_zone_id"),
        ArgSpec::str("location"),
        ArgSpec::dict("tags"),
    ])
    .prepare(|args| {
        let name = args.require_str("name")?;
        let arm = map_enum(name, &[("lab_vms_shutdown", "LabVmsShutdown"), ("lab_vms_startup", "LabVmAutoStart")])?;
        args.insert("schedule_name", json!(arm));
        Ok(())
    })
    .body(|args, _| {
        let task = match args.str("name") {
            Some("lab_vms_startup") => "LabVmsStartupTask",
            _ => "LabVmsShutdownTask",
        };
        let mut props = JsonMap::new();
        props.insert("status".into(), json!("Enabled"));
        props.insert("taskType".into(), json!(task));
        if let Some(t) = args.str("time") {
            props.insert("dailyRecurrence".into(), json!({ "time": t.replace(':', "") }));
        }
        if let Some(tz) = args.str("time_zone_id") {
            props.insert("timeZoneId".into(), json!(tz));
        }
        Ok(envelope(args, props))
    })
    .confirm_delete()
}

pub fn artifact_source() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_devtestlabartifactsource",
        "Microsoft.DevTestLab/labs/artifactsources",
        API,
        rg_path!("Microsoft.DevTestLab/labs/{lab_name}/artifactsources/{name}"),
    )
    .describe("Manage a DevTest lab artifact source")
    .args(lab_args())
    .args([
        ArgSpec::str("uri").required(),
        ArgSpec::str("source_type").required().choices(&["vso_git", "github"]),
        ArgSpec::str("folder_path"),
        ArgSpec::str("arm_template_folder_path"),
        ArgSpec::str("branch_ref"),
        ArgSpec::str("display_name"),
        ArgSpec::str("security_token"),
        ArgSpec::bool("is_enabled"),
        ArgSpec::dict("tags"),
    ])
    .body(|args, _| {
        let mut props = pick(
            args,
            &["uri", "folder_path", "arm_template_folder_path", "branch_ref", "display_name", "security_token"],
        );
        let source = args.require_str("source_type")?;
        props.insert("sourceType".into(), json!(map_enum(source, &[("vso_git", "VsoGit"), ("github", "GitHub")])?));
        if let Some(v) = enabled(args.bool("is_enabled")) {
            props.insert("status".into(), v);
        }
        Ok(envelope(args, props))
    })
    .write_only(&["/properties/securityToken"])
    .confirm_delete()
}

pub fn custom_image() -> ModuleSpec {
    ModuleSpec::new(
        "azure_rm_devtestlabcustomimage",
        "Microsoft.DevTestLab/labs/customimages",
        API,
        rg_path!("Microsoft.DevTestLab/labs/{lab_name}/customimages/{name}"),
    )
    .describe("Manage a DevTest lab custom image captured from a lab VM")
    .args(lab_args())
    .args([
        ArgSpec::str("source_vm").required(),
        ArgSpec::str("windows_os_state").choices(&["non_sysprepped", "sysprep_requested", "sysprep_applied"]),
        ArgSpec::str("linux_os_state").choices(&["non_deprovisioned", "deprovision_requested", "deprovision_applied"]),
        ArgSpec::str("description"),
        ArgSpec::str("author"),
        ArgSpec::dict("tags"),
    ])
    .body(|args, path| {
        let lab = parent_of(path, 1);
        let mut vm = JsonMap::new();
        vm.insert(
            "sourceVmId".into(),
            json!(format!("{}/virtualmachines/{}", lab, args.require_str("source_vm")?)),
        );
        if let Some(s) = args.str("windows_os_state") {
            vm.insert("windowsOsInfo".into(), json!({ "windowsOsState": crate::casing::snake_to_pascal(s) }));
        }
        if let Some(s) = args.str("linux_os_state") {
            vm.insert("linuxOsInfo".into(), json!({ "linuxOsState": crate::casing::snake_to_pascal(s) }));
        }
        let mut props = pick(args, &["description", "author"]);
        props.insert("vm".into(), Json::Object(vm));
        Ok(envelope(args, props))
    })
    .existence_only()
    .confirm_delete()
}
