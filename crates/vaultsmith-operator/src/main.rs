//! Vaultsmith Operator - provisions generated secrets and secret store deployments

use clap::{Parser, Subcommand};
use kube::Client;

use vaultsmith_common::telemetry::init_logging;
use vaultsmith_generate::{GeneratorRegistry, PropertySourcer};
use vaultsmith_operator::config::{OperatorConfig, OsEnvConfig};
use vaultsmith_operator::controller_runner::{build_claim_controllers, build_store_controllers};
use vaultsmith_operator::crds::{crd_manifests, ensure_crds_installed};
use vaultsmith_operator::health::{run_health_check, HealthArgs};

/// Vaultsmith - generated secrets and secret store provisioning for Kubernetes
#[derive(Parser, Debug)]
#[command(name = "vaultsmith", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the SecretClaim and SecretStore controllers (default mode)
    Controller,

    /// Round-trip a value through the Kubernetes Secret backend for a store's location and exit
    Health(HealthArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install aws-lc-rs crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        println!("{}", crd_manifests()?);
        return Ok(());
    }

    let config = OperatorConfig::from_env(&OsEnvConfig)?;
    init_logging(config.log_format)?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(config).await,
        Some(Commands::Health(args)) => {
            let client = Client::try_default().await?;
            run_health_check(client, &args).await
        }
    }
}

async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    tracing::info!(?config, "Starting Vaultsmith controller");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("failed to create Kubernetes client: {}", e))?;
    ensure_crds_installed(&client).await?;

    let registry = match &config.hmac_seed {
        Some(seed) => GeneratorRegistry::with_hmac_seed(seed.as_bytes()),
        None => GeneratorRegistry::new(),
    };

    tracing::info!("Starting controllers:");
    let mut controllers = build_claim_controllers(client.clone(), PropertySourcer::new(registry));
    controllers.extend(build_store_controllers(client, config.store_image));

    futures::future::join_all(controllers).await;
    tracing::info!("Vaultsmith controller shutting down");
    Ok(())
}
