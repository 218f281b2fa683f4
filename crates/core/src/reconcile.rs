use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, info};

use crate::compare::{compare_with_report, DiffReport};
use crate::error::Result;
use crate::poll::poll_until;
use crate::{Current, Desired, Resource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

impl std::str::FromStr for State {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "present" => Ok(State::Present),
            "absent" => Ok(State::Absent),
            other => Err(format!("invalid state '{}', expected present or absent", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    NoAction,
    Create,
    Update,
    Delete,
}

/// How an existing resource is checked against the desired one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareStrategy {
    #[default]
    Diff,
    /// Existing resources are never updated.
    ExistenceOnly,
}

#[derive(Debug, Clone, Serialize)]
pub struct Planned {
    pub action: Action,
    #[serde(skip)]
    pub current: Option<Current>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub changed: bool,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffReport>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Report what would change without calling any mutating operation.
    pub check_mode: bool,
}

pub fn decide(state: State, desired: &Desired, current: Option<&Current>, strategy: CompareStrategy) -> Planned {
    let (action, diff) = match (state, current) {
        (State::Absent, Some(_)) => (Action::Delete, None),
        (State::Absent, None) => (Action::NoAction, None),
        (State::Present, None) => (Action::Create, None),
        (State::Present, Some(_)) if strategy == CompareStrategy::ExistenceOnly => (Action::NoAction, None),
        (State::Present, Some(cur)) => {
            let mut report = DiffReport::default();
            if compare_with_report(&desired.0, &cur.0, &mut report) {
                (Action::NoAction, None)
            } else {
                (Action::Update, Some(report))
            }
        }
    };
    Planned { action, current: current.cloned(), diff }
}

pub async fn execute<R: Resource + ?Sized>(r: &R, planned: Planned, opts: &ReconcileOptions) -> Result<Outcome> {
    let id = &r.id().0;
    if let Some(d) = planned.diff.as_ref().and_then(|d| d.describe()) {
        debug!(resource = %id, diff = %d, "resource differs from desired state");
    }
    if opts.check_mode || planned.action == Action::NoAction {
        let state = match planned.action {
            Action::Delete => None,
            Action::Create => Some(r.format(&Current(r.desired().0.clone()))),
            _ => planned.current.as_ref().map(|c| r.format(c)),
        };
        return Ok(Outcome {
            changed: planned.action != Action::NoAction,
            action: planned.action,
            state,
            diff: planned.diff,
        });
    }
    match planned.action {
        Action::Create | Action::Update => {
            info!(resource = %id, action = ?planned.action, "applying");
            let cur = r.create_or_update(planned.action).await?;
            Ok(Outcome { changed: true, action: planned.action, state: Some(r.format(&cur)), diff: planned.diff })
        }
        Action::Delete => {
            info!(resource = %id, "deleting");
            r.delete().await?;
            if let Some(policy) = r.confirm_delete() {
                poll_until(&format!("deletion of {}", id), policy, move || async move { Ok(r.read().await?.is_none()) })
                    .await?;
            }
            Ok(Outcome { changed: true, action: Action::Delete, state: None, diff: None })
        }
        Action::NoAction => unreachable!("handled above"),
    }
}

/// Get, decide, act: converges one resource toward its desired state.
pub async fn reconcile<R: Resource + ?Sized>(r: &R, opts: &ReconcileOptions) -> Result<Outcome> {
    let cur = r.read().await?;
    let planned = decide(r.state(), r.desired(), cur.as_ref(), r.strategy());
    execute(r, planned, opts).await
}
