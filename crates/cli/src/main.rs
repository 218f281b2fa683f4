use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Map as JsonMap, Value as Json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use azrec_azure::{ArmClient, AzureConfig, Registry};
use azrec_core::{DiffReport, ReconcileOptions, Resource};
use azrec_mirror::{Mirror, MirrorConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "azrec: reconcile Azure resources to a desired state")]
struct Cli {
    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Reconcile a single module invocation
    Run {
        module: String,
        /// Argument file (YAML or JSON mapping)
        #[arg(short, long)]
        args: PathBuf,
        /// Report what would change without changing it
        #[arg(long)]
        check: bool,
    },
    /// Reconcile every resource of a stack file in dependency order
    Apply {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long)]
        check: bool,
    },
    /// Show the planned action of every resource of a stack file
    Plan {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List the module catalogue
    Modules,
    /// Check whether OLD already satisfies NEW
    Compare { new: PathBuf, old: PathBuf },
    /// Mirror upstream repository paths into a downstream pull request
    Mirror {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Deserialize, Debug)]
struct Stack {
    resources: Vec<StackEntry>,
}

#[derive(Deserialize, Debug, Clone)]
struct StackEntry {
    module: String,
    /// Name other entries use in `depends_on`; defaults to the ARM path.
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(flatten)]
    args: JsonMap<String, Json>,
}

fn read_tree<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_yaml::from_slice(&raw).with_context(|| format!("parse {}", path.display()))
}

fn print(v: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

fn client() -> Result<Arc<ArmClient>> {
    let cfg = AzureConfig::from_env().build()?;
    Ok(Arc::new(ArmClient::new(&cfg)?))
}

fn build(entries: Vec<StackEntry>, registry: &Registry, client: &Arc<ArmClient>) -> Result<Vec<Box<dyn Resource>>> {
    let mut out: Vec<Box<dyn Resource>> = Vec::new();
    for (i, e) in entries.into_iter().enumerate() {
        let mut r = azrec_azure::resource(registry, client.clone(), &e.module, &e.args)
            .with_context(|| format!("resource #{} ({})", i + 1, e.module))?;
        if let Some(id) = e.id {
            r = r.with_id(id);
        }
        out.push(Box::new(r.with_deps(e.depends_on)));
    }
    Ok(out)
}

fn diff_json(diff: Option<&DiffReport>) -> Json {
    match diff.and_then(DiffReport::describe) {
        Some(d) => json!(d),
        None => Json::Null,
    }
}

fn compare_files(new: &Path, old: &Path) -> Result<Json> {
    let new: Json = read_tree(new)?;
    let old: Json = read_tree(old)?;
    let mut report = DiffReport::default();
    let satisfied = azrec_core::compare_with_report(&new, &old, &mut report);
    Ok(json!({ "satisfied": satisfied, "diff": report.entries }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let registry = Registry::builtin();
    match cli.cmd {
        Cmd::Run { module, args, check } => {
            let raw: JsonMap<String, Json> = read_tree(&args)?;
            let r = azrec_azure::resource(&registry, client()?, &module, &raw)?;
            let outcome = azrec_core::reconcile(&r, &ReconcileOptions { check_mode: check }).await?;
            print(&json!({
                "changed": outcome.changed,
                "action": outcome.action,
                "id": r.path(),
                "state": outcome.state,
                "diff": diff_json(outcome.diff.as_ref()),
            }))?;
        }
        Cmd::Apply { file, check } => {
            let stack: Stack = read_tree(&file)?;
            let resources = build(stack.resources, &registry, &client()?)?;
            let plan = azrec_core::plan_all(&resources).await?;
            let opts = ReconcileOptions { check_mode: check };
            let outcomes = azrec_core::apply_all(&resources, plan, &opts).await?;
            let changed = outcomes.iter().filter(|(_, o)| o.changed).count();
            info!(resources = outcomes.len(), changed, check, "stack applied");
            let out: Vec<Json> = outcomes
                .into_iter()
                .map(|(id, o)| json!({ "id": id, "changed": o.changed, "action": o.action, "state": o.state }))
                .collect();
            print(&out)?;
        }
        Cmd::Plan { file } => {
            let stack: Stack = read_tree(&file)?;
            let resources = build(stack.resources, &registry, &client()?)?;
            let plan = azrec_core::plan_all(&resources).await?;
            let out: Vec<Json> = plan
                .iter()
                .map(|(pos, p)| json!({ "id": resources[*pos].id(), "action": p.action, "diff": diff_json(p.diff.as_ref()) }))
                .collect();
            print(&out)?;
        }
        Cmd::Modules => {
            let out: Vec<Json> = registry
                .iter()
                .map(|m| {
                    json!({
                        "name": m.name,
                        "description": m.description,
                        "resource_type": m.resource_type,
                        "api_version": m.api_version,
                        "args": m.args,
                    })
                })
                .collect();
            print(&out)?;
        }
        Cmd::Compare { new, old } => print(&compare_files(&new, &old)?)?,
        Cmd::Mirror { config, dry_run } => {
            let cfg = MirrorConfig::load(&config)?;
            let report = Mirror::new(cfg)?.run(dry_run).await?;
            print(&report)?;
        }
    }
    Ok(())
}
