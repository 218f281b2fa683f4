//! Declarative module definitions and their binding to the reconcile engine.

use async_trait::async_trait;
use azrec_core::{
    Action, CompareStrategy, Current, Desired, PollPolicy, ReconcileError, Resource, ResourceId, State,
};
use regex::Regex;
use serde_json::{json, Map as JsonMap, Value as Json};
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use crate::casing::{snake_to_camel, to_snake_tree};
use crate::client::ArmClient;
use crate::error::{AzureError, Result};
use crate::id::ArmId;
use crate::schema::{state_arg, ArgSpec, ModuleArgs};

/// Builds the PUT body from the arguments and the resolved resource path.
pub type BodyFn = fn(&ModuleArgs, &str) -> Result<Json>;
pub type PrepareFn = fn(&mut ModuleArgs) -> Result<()>;
pub type FormatFn = fn(&Json) -> Json;

/// What `state: absent` does to an existing resource.
#[derive(Clone, Copy)]
pub enum AbsentMode {
    Delete,
    /// The resource cannot be deleted; PUT this body instead. A resource
    /// whose `properties.source` is already `system-default` counts as absent.
    ResetToDefault(BodyFn),
}

pub struct ModuleSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub resource_type: &'static str,
    pub api_version: &'static str,
    /// ARM path with `{arg}` placeholders; `{subscription_id}` comes from the client.
    pub path: &'static str,
    pub args: Vec<ArgSpec>,
    /// Runs after validation, e.g. to derive path segments from choices.
    pub prepare: Option<PrepareFn>,
    pub body: BodyFn,
    pub format: FormatFn,
    pub strategy: CompareStrategy,
    /// Body pointers (`/properties/administratorLoginPassword`) ARM never echoes back.
    pub write_only: &'static [&'static str],
    pub absent: AbsentMode,
    pub confirm_delete: bool,
}

impl ModuleSpec {
    pub fn new(name: &'static str, resource_type: &'static str, api_version: &'static str, path: &'static str) -> Self {
        Self {
            name,
            description: "",
            resource_type,
            api_version,
            path,
            args: vec![state_arg()],
            prepare: None,
            body: |_, _| Ok(json!({})),
            format: format_resource,
            strategy: CompareStrategy::Diff,
            write_only: &[],
            absent: AbsentMode::Delete,
            confirm_delete: false,
        }
    }

    pub fn describe(mut self, d: &'static str) -> Self {
        self.description = d;
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = ArgSpec>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn prepare(mut self, f: PrepareFn) -> Self {
        self.prepare = Some(f);
        self
    }

    pub fn body(mut self, f: BodyFn) -> Self {
        self.body = f;
        self
    }

    pub fn format(mut self, f: FormatFn) -> Self {
        self.format = f;
        self
    }

    pub fn existence_only(mut self) -> Self {
        self.strategy = CompareStrategy::ExistenceOnly;
        self
    }

    pub fn write_only(mut self, paths: &'static [&'static str]) -> Self {
        self.write_only = paths;
        self
    }

    pub fn reset_on_absent(mut self, f: BodyFn) -> Self {
        self.absent = AbsentMode::ResetToDefault(f);
        self
    }

    pub fn confirm_delete(mut self) -> Self {
        self.confirm_delete = true;
        self
    }

    /// Fills the path template from `args` and the subscription.
    pub fn resolve_path(&self, subscription_id: &str, args: &ModuleArgs) -> Result<String> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("static regex"));
        let mut missing = None;
        let path = re.replace_all(self.path, |caps: &regex::Captures| {
            let key = &caps[1];
            if key == "subscription_id" {
                return subscription_id.to_string();
            }
            match args.str(key) {
                Some(v) => v.trim_end_matches('/').to_string(),
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });
        match missing {
            Some(k) => Err(AzureError::InvalidArgument(format!("missing required argument: {}", k))),
            None => Ok(path.into_owned()),
        }
    }

    /// Body used for comparison: the request body with write-only fields cleared.
    pub fn desired(&self, args: &ModuleArgs, path: &str) -> Result<Json> {
        let mut body = (self.body)(args, path)?;
        for ptr in self.write_only {
            if let Some(v) = body.pointer_mut(ptr) {
                *v = Json::Null;
            }
        }
        Ok(body)
    }
}

/// One module invocation bound to an ARM client.
pub struct ArmResource {
    spec: Arc<ModuleSpec>,
    client: Arc<ArmClient>,
    args: ModuleArgs,
    id: ResourceId,
    path: String,
    desired: Desired,
    deps: BTreeSet<ResourceId>,
}

impl ArmResource {
    pub fn new(spec: Arc<ModuleSpec>, client: Arc<ArmClient>, raw: &JsonMap<String, Json>) -> Result<Self> {
        let mut args = ModuleArgs::validate(&spec.args, raw)?;
        if let Some(prepare) = spec.prepare {
            prepare(&mut args)?;
        }
        let path = spec.resolve_path(client.subscription_id(), &args)?;
        let desired = match args.state() {
            State::Present => spec.desired(&args, &path)?,
            State::Absent => Json::Null,
        };
        Ok(Self {
            id: ResourceId(path.clone()),
            spec,
            client,
            args,
            path,
            desired: Desired(desired),
            deps: BTreeSet::new(),
        })
    }

    /// Overrides the id used for dependency ordering in stacks.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = ResourceId(id.into());
        self
    }

    pub fn with_deps(mut self, deps: impl IntoIterator<Item = String>) -> Self {
        self.deps.extend(deps.into_iter().map(ResourceId));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn cloud_error(&self, verb: &str, e: AzureError) -> ReconcileError {
        let name = self.args.str("name").unwrap_or(&self.path);
        match e {
            AzureError::InvalidArgument(m) => ReconcileError::InvalidArgument(m),
            e => ReconcileError::Cloud(format!("Error {} {} {}: {}", verb, self.spec.resource_type, name, e)),
        }
    }
}

#[async_trait]
impl Resource for ArmResource {
    fn id(&self) -> &ResourceId { &self.id }
    fn deps(&self) -> BTreeSet<ResourceId> { self.deps.clone() }
    fn state(&self) -> State { self.args.state() }
    fn desired(&self) -> &Desired { &self.desired }
    fn strategy(&self) -> CompareStrategy { self.spec.strategy }

    fn confirm_delete(&self) -> Option<PollPolicy> {
        match (self.spec.confirm_delete, self.spec.absent) {
            (true, AbsentMode::Delete) => Some(self.client.poll_policy()),
            _ => None,
        }
    }

    fn format(&self, cur: &Current) -> Json {
        (self.spec.format)(&cur.0)
    }

    async fn read(&self) -> azrec_core::Result<Option<Current>> {
        let found = self
            .client
            .get(&self.path, self.spec.api_version)
            .await
            .map_err(|e| self.cloud_error("reading", e))?;
        let found = match (self.spec.absent, self.args.state(), found) {
            (AbsentMode::ResetToDefault(_), State::Absent, Some(body))
                if body.pointer("/properties/source").and_then(Json::as_str) == Some("system-default") =>
            {
                None
            }
            (_, _, found) => found,
        };
        Ok(found.map(Current))
    }

    async fn create_or_update(&self, action: Action) -> azrec_core::Result<Current> {
        let verb = if action == Action::Create { "creating" } else { "updating" };
        let body = (self.spec.body)(&self.args, &self.path).map_err(|e| self.cloud_error(verb, e))?;
        let out = self
            .client
            .put(&self.path, self.spec.api_version, &body)
            .await
            .map_err(|e| self.cloud_error(verb, e))?;
        Ok(Current(out))
    }

    async fn delete(&self) -> azrec_core::Result<()> {
        match self.spec.absent {
            AbsentMode::Delete => self
                .client
                .delete(&self.path, self.spec.api_version)
                .await
                .map_err(|e| self.cloud_error("deleting", e)),
            AbsentMode::ResetToDefault(reset) => {
                let body = reset(&self.args, &self.path).map_err(|e| self.cloud_error("resetting", e))?;
                self.client
                    .put(&self.path, self.spec.api_version, &body)
                    .await
                    .map(|_| ())
                    .map_err(|e| self.cloud_error("resetting", e))
            }
        }
    }
}

/// Flattens an ARM envelope into the snake_case result mapping.
///
/// Envelope fields stay at the top level, `properties` are hoisted next to
/// them and `resource_group` is derived from the id.
pub fn format_resource(body: &Json) -> Json {
    let mut out = JsonMap::new();
    let Some(obj) = body.as_object() else {
        return body.clone();
    };
    for (k, v) in obj {
        if k == "properties" {
            if let Some(props) = v.as_object() {
                for (pk, pv) in props {
                    out.insert(crate::casing::camel_to_snake(pk), to_snake_tree(pv));
                }
            }
        } else if k == "tags" {
            out.insert(k.clone(), v.clone());
        } else {
            out.insert(crate::casing::camel_to_snake(k), to_snake_tree(v));
        }
    }
    if let Some(rg) = obj
        .get("id")
        .and_then(Json::as_str)
        .and_then(|id| ArmId::parse(id).ok())
        .and_then(|id| id.resource_group)
    {
        out.entry("resource_group").or_insert(json!(rg));
    }
    Json::Object(out)
}

/// Copies the named arguments, when given, into a camelCase mapping.
pub fn pick(args: &ModuleArgs, names: &[&str]) -> JsonMap<String, Json> {
    let mut out = JsonMap::new();
    for name in names {
        if let Some(v) = args.get(name) {
            out.insert(snake_to_camel(name), crate::casing::to_camel_tree(v));
        }
    }
    out
}

/// Translates a snake_case choice into the spelling ARM expects.
pub fn map_enum(value: &str, table: &[(&str, &str)]) -> Result<String> {
    table
        .iter()
        .find(|(from, _)| *from == value)
        .map(|(_, to)| to.to_string())
        .ok_or_else(|| AzureError::InvalidArgument(format!("unsupported value '{}'", value)))
}

/// `/subscriptions/{id}/resourceGroups/{rg}` part of a resource path.
pub fn scope_of(path: &str) -> &str {
    match path.find("/providers/") {
        Some(i) => &path[..i],
        None => path,
    }
}

/// Path of the parent resource, `levels` type/name pairs up.
pub fn parent_of(path: &str, levels: usize) -> &str {
    let mut end = path.len();
    for _ in 0..levels * 2 {
        end = path[..end].rfind('/').unwrap_or(0);
    }
    &path[..end]
}

/// `{"id": "<parent>/<collection>/<name>"}` reference to a sibling sub-resource.
pub fn sub_ref(parent: &str, collection: &str, name: &Json) -> Json {
    match name.as_str() {
        Some(n) if n.starts_with("/subscriptions/") => json!({ "id": n }),
        Some(n) => json!({ "id": format!("{}/{}/{}", parent, collection, n) }),
        None => Json::Null,
    }
}

/// `Enabled` / `Disabled` for boolean switches.
pub fn enabled(flag: Option<bool>) -> Option<Json> {
    flag.map(|b| json!(if b { "Enabled" } else { "Disabled" }))
}

/// Standard tracked-resource envelope: `location`, `tags`, `properties`.
pub fn envelope(args: &ModuleArgs, properties: JsonMap<String, Json>) -> Json {
    let mut body = JsonMap::new();
    if let Some(loc) = args.get("location") {
        body.insert("location".into(), loc.clone());
    }
    if let Some(tags) = args.get("tags") {
        body.insert("tags".into(), tags.clone());
    }
    body.insert("properties".into(), Json::Object(properties));
    Json::Object(body)
}

/// `resource_group`, `name`, `location` and `tags`, shared by tracked resources.
pub fn tracked_args() -> Vec<ArgSpec> {
    vec![
        ArgSpec::str("resource_group").required(),
        ArgSpec::str("name").required(),
        ArgSpec::str("location"),
        ArgSpec::dict("tags"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(v: Json) -> ModuleArgs {
        ModuleArgs::from_map(v.as_object().cloned().unwrap())
    }

    #[test]
    fn resolves_path_placeholders() {
        let spec = ModuleSpec::new(
            "t",
            "Microsoft.Sql/servers/databases",
            "2017-10-01-preview",
            "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Sql/servers/{server_name}/databases/{name}",
        );
        let a = args(json!({"resource_group": "rg", "server_name": "srv", "name": "db"}));
        assert_eq!(
            spec.resolve_path("sub", &a).unwrap(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Sql/servers/srv/databases/db"
        );
        let err = spec.resolve_path("sub", &args(json!({"resource_group": "rg", "name": "db"}))).unwrap_err();
        assert!(err.to_string().contains("server_name"));
    }

    #[test]
    fn write_only_fields_are_cleared_for_comparison() {
        let spec = ModuleSpec::new("t", "x", "v", "/p")
            .body(|_, _| Ok(json!({"properties": {"administratorLoginPassword": "p", "version": "12"}})))
            .write_only(&["/properties/administratorLoginPassword"]);
        let desired = spec.desired(&ModuleArgs::default(), "/p").unwrap();
        assert_eq!(desired, json!({"properties": {"administratorLoginPassword": null, "version": "12"}}));
    }

    #[test]
    fn formats_arm_envelope() {
        let body = json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/srv",
            "name": "srv",
            "type": "Microsoft.Sql/servers",
            "location": "eastus",
            "tags": {"CostCenter": "42"},
            "properties": {"provisioningState": "Succeeded", "fullyQualifiedDomainName": "srv.database.windows.net"}
        });
        assert_eq!(
            format_resource(&body),
            json!({
                "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/srv",
                "name": "srv",
                "type": "Microsoft.Sql/servers",
                "location": "eastus",
                "tags": {"CostCenter": "42"},
                "provisioning_state": "Succeeded",
                "fully_qualified_domain_name": "srv.database.windows.net",
                "resource_group": "rg"
            })
        );
    }

    #[test]
    fn path_helpers() {
        let p = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.DevTestLab/labs/lab/customimages/img";
        assert_eq!(scope_of(p), "/subscriptions/s/resourceGroups/rg");
        assert_eq!(parent_of(p, 1), "/subscriptions/s/resourceGroups/rg/providers/Microsoft.DevTestLab/labs/lab");
        assert_eq!(sub_ref("/gw", "frontendPorts", &json!("port80")), json!({"id": "/gw/frontendPorts/port80"}));
        assert_eq!(sub_ref("/gw", "x", &json!("/subscriptions/s/a")), json!({"id": "/subscriptions/s/a"}));
        assert_eq!(enabled(Some(false)), Some(json!("Disabled")));
    }

    #[test]
    fn pick_and_map_enum() {
        let a = args(json!({"start_ip_address": "10.0.0.1", "unused": 1}));
        assert_eq!(Json::Object(pick(&a, &["start_ip_address", "end_ip_address"])), json!({"startIpAddress": "10.0.0.1"}));
        assert_eq!(map_enum("basic", &[("basic", "Basic")]).unwrap(), "Basic");
        assert!(map_enum("gold", &[("basic", "Basic")]).is_err());
    }

    mod against_arm {
        use super::super::*;
        use crate::config::AzureConfig;
        use azrec_core::ReconcileOptions;
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const PARAM: &str =
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.DBforMySQL/servers/srv/configurations/event_scheduler";
        const RULE: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/srv/firewallRules/office";

        fn resource(server: &MockServer) -> ArmResource {
            let cfg = AzureConfig::builder().subscription_id("s").access_token("t").endpoint(server.uri()).build().unwrap();
            let client = Arc::new(ArmClient::new(&cfg).unwrap());
            let raw = json!({"resource_group": "rg", "server_name": "srv", "name": "office",
                             "start_ip_address": "10.0.0.1", "end_ip_address": "10.0.0.9"});
            crate::resource(&crate::Registry::builtin(), client, "azure_rm_sqlfirewallrule", raw.as_object().unwrap()).unwrap()
        }

        fn absent_parameter(server: &MockServer) -> ArmResource {
            let cfg = AzureConfig::builder().subscription_id("s").access_token("t").endpoint(server.uri()).build().unwrap();
            let client = Arc::new(ArmClient::new(&cfg).unwrap());
            let raw = json!({"resource_group": "rg", "server_name": "srv", "name": "event_scheduler", "state": "absent"});
            crate::resource(&crate::Registry::builtin(), client, "azure_rm_mysqlconfiguration", raw.as_object().unwrap()).unwrap()
        }

        fn remote() -> Json {
            json!({"id": RULE, "name": "office", "properties": {"startIpAddress": "10.0.0.1", "endIpAddress": "10.0.0.9"}})
        }

        #[tokio::test]
        async fn missing_resource_is_created() {
            let server = MockServer::start().await;
            Mock::given(method("GET")).and(path(RULE)).respond_with(ResponseTemplate::new(404)).mount(&server).await;
            Mock::given(method("PUT"))
                .and(path(RULE))
                .respond_with(ResponseTemplate::new(200).set_body_json(remote()))
                .expect(1)
                .mount(&server)
                .await;
            let out = azrec_core::reconcile(&resource(&server), &ReconcileOptions::default()).await.unwrap();
            assert!(out.changed);
            assert_eq!(out.action, Action::Create);
            assert_eq!(out.state.unwrap()["start_ip_address"], json!("10.0.0.1"));
        }

        #[tokio::test]
        async fn matching_resource_is_left_alone() {
            let server = MockServer::start().await;
            Mock::given(method("GET")).and(path(RULE)).respond_with(ResponseTemplate::new(200).set_body_json(remote())).mount(&server).await;
            Mock::given(method("PUT")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
            let out = azrec_core::reconcile(&resource(&server), &ReconcileOptions::default()).await.unwrap();
            assert!(!out.changed);
            assert_eq!(out.action, Action::NoAction);
            assert_eq!(out.state.unwrap()["resource_group"], json!("rg"));
        }

        #[tokio::test]
        async fn check_mode_reports_update_without_calling_put() {
            let server = MockServer::start().await;
            let mut drifted = remote();
            drifted["properties"]["endIpAddress"] = json!("10.0.0.200");
            Mock::given(method("GET")).and(path(RULE)).respond_with(ResponseTemplate::new(200).set_body_json(drifted)).mount(&server).await;
            Mock::given(method("PUT")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
            let out = azrec_core::reconcile(&resource(&server), &ReconcileOptions { check_mode: true }).await.unwrap();
            assert!(out.changed);
            assert_eq!(out.action, Action::Update);
            assert_eq!(out.diff.unwrap().entries[0].path, "/properties/endIpAddress");
        }

        #[tokio::test]
        async fn check_mode_create_reports_formatted_state() {
            let server = MockServer::start().await;
            Mock::given(method("GET")).and(path(RULE)).respond_with(ResponseTemplate::new(404)).mount(&server).await;
            Mock::given(method("PUT")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
            let out = azrec_core::reconcile(&resource(&server), &ReconcileOptions { check_mode: true }).await.unwrap();
            assert!(out.changed);
            assert_eq!(out.action, Action::Create);
            let state = out.state.unwrap();
            assert_eq!(state["start_ip_address"], json!("10.0.0.1"));
            assert_eq!(state["end_ip_address"], json!("10.0.0.9"));
            assert_eq!(state.get("properties"), None);
        }

        #[tokio::test]
        async fn absent_parameter_is_reset_not_deleted() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(PARAM))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": PARAM, "name": "event_scheduler",
                    "properties": {"value": "ON", "source": "user-override"}
                })))
                .mount(&server)
                .await;
            Mock::given(method("PUT"))
                .and(path(PARAM))
                .and(body_partial_json(json!({"properties": {"source": "system-default"}})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": PARAM, "name": "event_scheduler",
                    "properties": {"value": "OFF", "source": "system-default"}
                })))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("DELETE")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
            let out = azrec_core::reconcile(&absent_parameter(&server), &ReconcileOptions::default()).await.unwrap();
            assert!(out.changed);
            assert_eq!(out.action, Action::Delete);
            assert_eq!(out.state, None);
        }

        #[tokio::test]
        async fn parameter_at_system_default_reads_as_absent() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(PARAM))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": PARAM, "name": "event_scheduler",
                    "properties": {"value": "OFF", "source": "system-default"}
                })))
                .mount(&server)
                .await;
            Mock::given(method("PUT")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
            Mock::given(method("DELETE")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
            let out = azrec_core::reconcile(&absent_parameter(&server), &ReconcileOptions::default()).await.unwrap();
            assert!(!out.changed);
            assert_eq!(out.action, Action::NoAction);
        }
    }
}
