use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use serde_json::Value as Json;
use std::collections::BTreeSet;
use petgraph::graph::DiGraph;
use petgraph::algo::toposort;
use tracing::info;

pub mod compare;
pub mod error;
pub mod poll;
pub mod reconcile;

pub use compare::{compare_with_report, default_compare, DiffReport};
pub use error::{ReconcileError, Result};
pub use poll::{poll_until, PollPolicy};
pub use reconcile::{decide, execute, reconcile, Action, CompareStrategy, Outcome, Planned, ReconcileOptions, State};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub String);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Desired tree; `null` leaves mean "no opinion".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Desired(pub Json);
/// Tree observed on the remote side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Current(pub Json);

/// One remotely managed object.
///
/// `read` must map "not found" to `Ok(None)`; every other failure is an error.
#[async_trait]
pub trait Resource: Send + Sync {
    fn id(&self) -> &ResourceId;
    fn deps(&self) -> BTreeSet<ResourceId> { BTreeSet::new() }
    fn state(&self) -> State;
    fn desired(&self) -> &Desired;
    fn strategy(&self) -> CompareStrategy { CompareStrategy::Diff }
    /// Polling used to confirm a delete finished; `None` trusts the delete call.
    fn confirm_delete(&self) -> Option<PollPolicy> { None }
    /// Shapes an observed tree into the caller-facing result.
    fn format(&self, cur: &Current) -> Json { cur.0.clone() }

    async fn read(&self) -> Result<Option<Current>>;
    async fn create_or_update(&self, action: Action) -> Result<Current>;
    async fn delete(&self) -> Result<()>;

    fn plan(&self, cur: Option<&Current>) -> Planned {
        decide(self.state(), self.desired(), cur, self.strategy())
    }
}

/// Dependency order of `resources`; ids referenced but not present are ignored.
pub fn order(resources: &[Box<dyn Resource>]) -> Result<Vec<usize>> {
    use std::collections::HashMap;
    let mut g: DiGraph<usize, ()> = DiGraph::new();
    let mut id_to_ix = HashMap::new();
    for (pos, r) in resources.iter().enumerate() {
        let ix = g.add_node(pos);
        if id_to_ix.insert(r.id().0.clone(), ix).is_some() {
            return Err(ReconcileError::InvalidArgument(format!("duplicate resource id '{}'", r.id())));
        }
    }
    for r in resources {
        let to_ix = id_to_ix[&r.id().0];
        for d in r.deps() {
            if let Some(&from_ix) = id_to_ix.get(&d.0) {
                g.add_edge(from_ix, to_ix, ());
            }
        }
    }
    let ordered_ix = toposort(&g, None).map_err(|_| ReconcileError::Cycle)?;
    Ok(ordered_ix.into_iter().map(|ix| g[ix]).collect())
}

pub async fn plan_all(resources: &[Box<dyn Resource>]) -> Result<Vec<(usize, Planned)>> {
    let mut out = Vec::new();
    for pos in order(resources)? {
        let r = &resources[pos];
        let cur = r.read().await?;
        let planned = r.plan(cur.as_ref());
        info!(resource = %r.id(), action = ?planned.action, "planned");
        out.push((pos, planned));
    }
    Ok(out)
}

pub async fn apply_all(
    resources: &[Box<dyn Resource>],
    plan: Vec<(usize, Planned)>,
    opts: &ReconcileOptions,
) -> Result<Vec<(ResourceId, Outcome)>> {
    let mut out = Vec::new();
    for (pos, planned) in plan {
        let r = &resources[pos];
        let outcome = execute(r.as_ref(), planned, opts).await?;
        out.push((r.id().clone(), outcome));
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory resource that records which mutating calls were made.
    pub struct FakeResource {
        pub id: ResourceId,
        pub deps: BTreeSet<ResourceId>,
        pub state: State,
        pub desired: Desired,
        pub strategy: CompareStrategy,
        pub remote: Mutex<Option<Json>>,
        pub calls: Mutex<Vec<&'static str>>,
        pub confirm: Option<PollPolicy>,
        pub formatter: Option<fn(&Json) -> Json>,
    }

    impl FakeResource {
        pub fn new(id: &str, desired: Json, remote: Option<Json>) -> Self {
            Self {
                id: ResourceId(id.to_string()),
                deps: BTreeSet::new(),
                state: State::Present,
                desired: Desired(desired),
                strategy: CompareStrategy::Diff,
                remote: Mutex::new(remote),
                calls: Mutex::new(Vec::new()),
                confirm: None,
                formatter: None,
            }
        }

        pub fn depends_on(mut self, id: &str) -> Self {
            self.deps.insert(ResourceId(id.to_string()));
            self
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Resource for FakeResource {
        fn id(&self) -> &ResourceId { &self.id }
        fn deps(&self) -> BTreeSet<ResourceId> { self.deps.clone() }
        fn state(&self) -> State { self.state }
        fn desired(&self) -> &Desired { &self.desired }
        fn strategy(&self) -> CompareStrategy { self.strategy }
        fn confirm_delete(&self) -> Option<PollPolicy> { self.confirm }

        fn format(&self, cur: &Current) -> Json {
            match self.formatter {
                Some(f) => f(&cur.0),
                None => cur.0.clone(),
            }
        }

        async fn read(&self) -> Result<Option<Current>> {
            self.calls.lock().unwrap().push("read");
            Ok(self.remote.lock().unwrap().clone().map(Current))
        }

        async fn create_or_update(&self, _action: Action) -> Result<Current> {
            self.calls.lock().unwrap().push("create_or_update");
            let body = self.desired.0.clone();
            *self.remote.lock().unwrap() = Some(body.clone());
            Ok(Current(body))
        }

        async fn delete(&self) -> Result<()> {
            self.calls.lock().unwrap().push("delete");
            *self.remote.lock().unwrap() = None;
            Ok(())
        }
    }
}
