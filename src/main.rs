//! static-pod-ota - node-side OTA upgrade driver for static pods

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use kube::Client;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use static_pod_ota::config::UpgradeConfig;
use static_pod_ota::precheck::{pre_check, PreCheck};
use static_pod_ota::source::KubeSourceClient;
use static_pod_ota::upgrader::StaticPodUpgrader;

/// static-pod-ota - check and apply OTA upgrades for static pods on this node
#[derive(Parser, Debug)]
#[command(name = "static-pod-ota", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether an upgrade is admissible for a static pod
    ///
    /// Exits 0 when the upgrade source is published, 1 when it is not yet
    /// eligible. A malformed pod identifier is an error.
    Precheck(RequestArgs),

    /// Fetch the published manifest and write it for the watcher
    Apply(ApplyArgs),
}

/// Identification of one upgrade request
#[derive(Args, Debug)]
struct RequestArgs {
    /// Composite pod identifier, "<staticPodName>-<nodeName>"
    pod: String,

    /// Name of this node
    #[arg(long, env = "NODE_NAME")]
    node: String,

    /// Namespace holding the upgrade source ConfigMap
    #[arg(long, default_value = "default")]
    namespace: String,
}

/// Apply mode arguments
#[derive(Args, Debug)]
struct ApplyArgs {
    #[command(flatten)]
    request: RequestArgs,

    /// Directory watched for upgrade manifests
    #[arg(long, default_value = static_pod_ota::DEFAULT_UPGRADE_DIR)]
    upgrade_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = Client::try_default().await?;
    let source = Arc::new(KubeSourceClient::new(client));

    match cli.command {
        Commands::Precheck(args) => {
            let outcome = pre_check(source.as_ref(), &args.pod, &args.node, &args.namespace).await?;
            match outcome {
                PreCheck::Ready { static_name } => println!("ready: {static_name}"),
                PreCheck::SourceMissing { static_name } => {
                    println!("not yet eligible: {static_name}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Apply(args) => {
            let outcome = pre_check(
                source.as_ref(),
                &args.request.pod,
                &args.request.node,
                &args.request.namespace,
            )
            .await?;
            let PreCheck::Ready { static_name } = outcome else {
                anyhow::bail!(
                    "no upgrade source published for {} in namespace {}",
                    args.request.pod,
                    args.request.namespace
                );
            };

            let upgrader = StaticPodUpgrader::new(
                source,
                args.request.namespace,
                args.request.pod,
                static_name,
                UpgradeConfig::new(args.upgrade_dir),
            );
            upgrader.apply().await?;
        }
    }

    Ok(())
}
