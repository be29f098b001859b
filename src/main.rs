use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, ListParams};
use kube::ResourceExt;
use l4lb_status::cloud::InMemoryCloudProvider;
use l4lb_status::controller::{
    plan_conditions, reconcile_status, services_referenced_by_ingress,
    services_referencing_backend_config, services_referencing_logging_config_map, ConditionType,
    ControllerConfig, ControllerContext, KubeServiceClient, KubeStatusMirrorStore, ServiceClient,
    SyncResult,
};
use l4lb_status::crd::{BackendConfig, IpFamily, LbProtocol, ServiceIntentExt};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Namespace used for names given without one
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = "default", global = true)]
    namespace: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the condition types planned for a protocol and IP families
    Plan(PlanArgs),
    /// List Services affected by a change to a shared object
    Affected(AffectedArgs),
    /// Publish conditions and the status mirror for one Service
    Reconcile(ReconcileArgs),
    /// Show version information
    Version,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    #[arg(long, default_value = "TCP")]
    protocol: LbProtocol,

    /// Repeat for dual-stack
    #[arg(long = "ip-family", default_values_t = vec![IpFamily::IPv4])]
    ip_families: Vec<IpFamily>,
}

#[derive(Parser, Debug)]
#[group(required = true, multiple = false)]
struct AffectedArgs {
    /// BackendConfig as [namespace/]name
    #[arg(long)]
    backend_config: Option<String>,

    /// L4 logging ConfigMap as [namespace/]name
    #[arg(long)]
    logging_config_map: Option<String>,

    /// Ingress as [namespace/]name
    #[arg(long)]
    ingress: Option<String>,
}

#[derive(Parser, Debug)]
struct ReconcileArgs {
    /// Service as [namespace/]name
    #[arg(long)]
    service: String,

    /// Allocated resource as <ConditionType>=<self link>
    #[arg(long = "allocated")]
    allocated: Vec<String>,

    /// Failed allocation as <ConditionType>=<message>
    #[arg(long = "failed")]
    failed: Vec<String>,

    /// Owned resource without a condition slot (e.g. a NEG)
    #[arg(long = "owns")]
    owns: Vec<String>,

    /// Log mutating calls instead of performing them
    #[arg(long, env = "READ_ONLY")]
    read_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    match args.command {
        Commands::Version => {
            println!("l4lb-status v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Plan(plan) => {
            for condition_type in plan_conditions(plan.protocol, &plan.ip_families) {
                println!("{condition_type}");
            }
            Ok(())
        }
        Commands::Affected(affected) => run_affected(&args.namespace, affected).await,
        Commands::Reconcile(reconcile) => run_reconcile(&args.namespace, reconcile).await,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
    }
}

/// Split `[namespace/]name`, falling back to the default namespace
fn split_key(key: &str, default_namespace: &str) -> anyhow::Result<(String, String)> {
    match key.split_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() => {
            Ok((ns.to_string(), name.to_string()))
        }
        Some(_) => bail!("invalid object key: {key}"),
        None if key.is_empty() => bail!("empty object key"),
        None => Ok((default_namespace.to_string(), key.to_string())),
    }
}

/// Split `<ConditionType>=<value>`
fn split_assignment(arg: &str) -> anyhow::Result<(ConditionType, String)> {
    let (condition_type, value) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected <ConditionType>=<value>, got {arg}"))?;
    let condition_type = condition_type
        .parse::<ConditionType>()
        .map_err(|e| anyhow!(e))?;
    Ok((condition_type, value.to_string()))
}

fn print_services(services: &[&Service]) {
    for service in services {
        println!("{}", service.intent_key());
    }
}

async fn run_affected(default_namespace: &str, args: AffectedArgs) -> anyhow::Result<()> {
    let client = kube::Client::try_default()
        .await
        .context("connecting to Kubernetes")?;
    let services = KubeServiceClient::new(client.clone())
        .list(&ListParams::default())
        .await?;
    info!("Loaded {} Services", services.len());

    if let Some(key) = args.backend_config {
        let (ns, name) = split_key(&key, default_namespace)?;
        let api: Api<BackendConfig> = Api::namespaced(client, &ns);
        let config = api.get(&name).await?;
        print_services(&services_referencing_backend_config(&services, &config));
    } else if let Some(key) = args.logging_config_map {
        let (ns, name) = split_key(&key, default_namespace)?;
        let api: Api<ConfigMap> = Api::namespaced(client, &ns);
        let config_map = api.get_opt(&name).await?;
        if config_map.is_none() {
            info!("ConfigMap {}/{} not found, nothing references it", ns, name);
        }
        print_services(&services_referencing_logging_config_map(
            &services,
            config_map.as_ref(),
        ));
    } else if let Some(key) = args.ingress {
        let (ns, name) = split_key(&key, default_namespace)?;
        let api: Api<Ingress> = Api::namespaced(client, &ns);
        let ingress = api.get(&name).await?;
        print_services(&services_referenced_by_ingress(&ingress, &services));
    }

    Ok(())
}

async fn run_reconcile(default_namespace: &str, args: ReconcileArgs) -> anyhow::Result<()> {
    let (ns, name) = split_key(&args.service, default_namespace)?;

    let mut sync = SyncResult::new();
    for arg in &args.allocated {
        let (condition_type, resource) = split_assignment(arg)?;
        sync = sync.allocated(condition_type, resource);
    }
    for arg in &args.failed {
        let (condition_type, message) = split_assignment(arg)?;
        sync = sync.failed(condition_type, message);
    }
    for resource in args.owns {
        sync = sync.owns(resource);
    }

    let client = kube::Client::try_default()
        .await
        .context("connecting to Kubernetes")?;
    info!("Connected to Kubernetes cluster");

    let cloud =
        InMemoryCloudProvider::from_self_links(sync.owned_resources.iter().map(String::as_str));
    let ctx = ControllerContext::new(
        Arc::new(KubeServiceClient::new(client.clone())),
        Arc::new(KubeStatusMirrorStore::new(client)),
        Arc::new(cloud),
        ControllerConfig {
            read_only: args.read_only,
            ..Default::default()
        },
    );

    let service = ctx.services.get(&ns, &name).await?;
    let outcome = reconcile_status(&ctx, &service, &sync).await?;

    info!(
        "Reconciled Service {}: conditions written: {}, removed: {}, mirror: {:?}",
        service.name_any(),
        outcome.conditions_written,
        outcome.removed.len(),
        outcome.mirror
    );
    for condition_type in &outcome.removed {
        println!("removed {condition_type}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_key() {
        assert_eq!(
            split_key("kube-system/cfg", "default").unwrap(),
            ("kube-system".to_string(), "cfg".to_string())
        );
        assert_eq!(
            split_key("cfg", "default").unwrap(),
            ("default".to_string(), "cfg".to_string())
        );
        assert!(split_key("/cfg", "default").is_err());
        assert!(split_key("", "default").is_err());
    }

    #[test]
    fn test_split_assignment() {
        let (condition_type, value) =
            split_assignment("ServiceLoadBalancerHealthCheck=projects/p/global/healthChecks/hc")
                .unwrap();
        assert_eq!(condition_type, ConditionType::HealthCheck);
        assert_eq!(value, "projects/p/global/healthChecks/hc");
        assert!(split_assignment("Unknown=x").is_err());
        assert!(split_assignment("no-separator").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "l4lb-status",
            "plan",
            "--protocol",
            "udp",
            "--ip-family",
            "IPv4",
            "--ip-family",
            "IPv6",
        ])
        .unwrap();
        match args.command {
            Commands::Plan(plan) => {
                assert_eq!(plan.protocol, LbProtocol::Udp);
                assert_eq!(plan.ip_families, vec![IpFamily::IPv4, IpFamily::IPv6]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
