use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use ferry_core::{DEFAULT_ARGOCD_NAMESPACE, DEFAULT_FLUX_NAMESPACE};
use ferry_kubehub::KubeStore;
use ferry_ops::{
    ensure_target_controller, migrate_all, plan_helm_release, plan_kustomization, scan, BatchOptions, BatchReport, Cutover, CutoverPlan,
    CutoverReport, DecommissionOptions, Inventory, DEFAULT_DECOMMISSION_TIMEOUT,
};
use ferry_translate::TargetSettings;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ferryctl", version, about = "Migrate Flux workloads to Argo CD")]
struct Cli {
    /// Output format for scan results
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Path to a kubeconfig file (default: KUBECONFIG, ~/.kube/config, in-cluster)
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    /// Namespace Argo CD is installed in
    #[arg(long = "argocd-namespace", global = true, env = "FERRY_ARGOCD_NAMESPACE", default_value = DEFAULT_ARGOCD_NAMESPACE)]
    argocd_namespace: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate one HelmRelease to an Argo CD Application
    Helmrelease {
        #[arg(long)]
        name: String,
        #[arg(short = 'n', long)]
        namespace: String,
        /// Deploy into this namespace instead of the release's target namespace
        #[arg(long = "destination-namespace")]
        destination_namespace: Option<String>,
        /// Apply the migration; without it the Argo CD objects are printed
        #[arg(long = "confirm-migrate", action = ArgAction::SetTrue)]
        confirm_migrate: bool,
    },
    /// Migrate one Kustomization to an Argo CD ApplicationSet
    Kustomization {
        #[arg(long)]
        name: String,
        #[arg(short = 'n', long)]
        namespace: String,
        #[arg(long = "destination-namespace")]
        destination_namespace: Option<String>,
        /// Extra directories to skip, comma separated
        #[arg(long = "exclude-dirs", value_delimiter = ',')]
        exclude_dirs: Vec<String>,
        #[arg(long = "confirm-migrate", action = ArgAction::SetTrue)]
        confirm_migrate: bool,
    },
    /// List every Flux workload; optionally migrate them all and remove Flux
    Scan {
        #[arg(long = "auto-migrate", action = ArgAction::SetTrue)]
        auto_migrate: bool,
        /// Skip the interactive confirmation for --auto-migrate
        #[arg(long, action = ArgAction::SetTrue)]
        confirm: bool,
        #[arg(long = "exclude-dirs", value_delimiter = ',')]
        exclude_dirs: Vec<String>,
        /// Namespace Flux is installed in
        #[arg(long = "flux-namespace", env = "FERRY_FLUX_NAMESPACE", default_value = DEFAULT_FLUX_NAMESPACE)]
        flux_namespace: String,
    },
}

fn init_tracing() {
    let env = std::env::var("FERRY_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries manifests; logs go to stderr.
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("FERRY_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid FERRY_METRICS_ADDR; expected host:port");
        }
    }
}

fn decommission_timeout() -> Duration {
    std::env::var("FERRY_DECOMMISSION_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_DECOMMISSION_TIMEOUT)
}

fn settings(cli: &Cli, destination_namespace: Option<String>, exclude_dirs: Vec<String>) -> TargetSettings {
    TargetSettings {
        argocd_namespace: cli.argocd_namespace.clone(),
        destination_namespace,
        exclude_dirs: exclude_dirs.into_iter().map(|d| d.trim().to_string()).filter(|d| !d.is_empty()).collect(),
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let client = ferry_kubehub::connect(cli.kubeconfig.as_deref(), cli.context.as_deref()).await?;
    let store = KubeStore::new(client);

    match &cli.command {
        Commands::Helmrelease { name, namespace, destination_namespace, confirm_migrate } => {
            info!(name = %name, ns = %namespace, "helmrelease invoked");
            let settings = settings(&cli, destination_namespace.clone(), Vec::new());
            let plan = plan_helm_release(&store, namespace, name, &settings).await?;
            execute(&store, plan, &settings, *confirm_migrate).await?;
        }
        Commands::Kustomization { name, namespace, destination_namespace, exclude_dirs, confirm_migrate } => {
            info!(name = %name, ns = %namespace, "kustomization invoked");
            let settings = settings(&cli, destination_namespace.clone(), exclude_dirs.clone());
            let plan = plan_kustomization(&store, namespace, name, &settings).await?;
            execute(&store, plan, &settings, *confirm_migrate).await?;
        }
        Commands::Scan { auto_migrate, confirm, exclude_dirs, flux_namespace } => {
            info!(auto_migrate, "scan invoked");
            let inventory = scan(&store).await?;
            print_inventory(&inventory, cli.output)?;
            if !auto_migrate {
                return Ok(());
            }
            if inventory.is_empty() {
                println!("nothing to migrate");
                return Ok(());
            }
            if !confirm && !prompt(&format!("Migrate {} workload(s) to Argo CD and remove Flux from {}?", inventory.rows().len(), flux_namespace))? {
                warn!("auto-migrate not confirmed; nothing changed");
                return Ok(());
            }
            let opts = BatchOptions {
                settings: settings(&cli, None, exclude_dirs.clone()),
                decommission: DecommissionOptions { namespace: flux_namespace.clone(), timeout: decommission_timeout() },
            };
            let report = migrate_all(&store, &inventory, &opts).await?;
            print_batch(&report);
            if !report.is_success() {
                bail!("migration incomplete; see the report above");
            }
        }
    }

    Ok(())
}

/// Print the plan's objects, or carry the cutover out when confirmed.
async fn execute(store: &KubeStore, plan: CutoverPlan, settings: &TargetSettings, confirm: bool) -> Result<()> {
    if !confirm {
        let stdout = std::io::stdout();
        return ferry_apply::write_manifests(stdout.lock(), &plan.targets);
    }
    ensure_target_controller(store, &settings.argocd_namespace).await?;
    let report = Cutover::new(store, plan).run().await?;
    print_cutover(&report);
    Ok(())
}

fn print_cutover(report: &CutoverReport) {
    for k in &report.created { println!("created     {}", k); }
    for k in &report.overwritten { println!("overwritten {}", k); }
    for k in &report.deleted { println!("deleted     {}", k); }
    for k in &report.skipped { println!("skipped     {} (already gone)", k); }
}

fn print_inventory(inventory: &Inventory, output: Output) -> Result<()> {
    let rows = inventory.rows();
    match output {
        Output::Human => {
            println!("{:<14} {:<20} {:<30} {:<9} STATUS", "KIND", "NAMESPACE", "NAME", "SUSPENDED");
            for r in &rows {
                println!("{:<14} {:<20} {:<30} {:<9} {}", format!("{:?}", r.kind), r.namespace, r.name, r.suspended, r.status);
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

fn print_batch(report: &BatchReport) {
    for o in &report.outcomes {
        match &o.result {
            Ok(_) => println!("ok    {}", o.workload),
            Err(e) => println!("FAIL  {}: {}", o.workload, e),
        }
    }
    match &report.decommission {
        Some(Ok(d)) => println!("flux removed: {} object(s) deleted, {} finalizer(s) cleared", d.deleted.len(), d.finalizers_removed.len()),
        Some(Err(e)) => println!("flux removal failed: {}", e),
        None => println!("flux left installed: not every workload migrated"),
    }
}

fn prompt(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush().context("flushing prompt")?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer).context("reading confirmation")?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool { matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") }
