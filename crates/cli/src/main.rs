//! ECS Service Deployer CLI
//!
//! A command-line tool that deploys a container image to an ECS-style
//! service: it merges the request over the latest task-definition revision,
//! registers the result, repoints the service, waits for stability and
//! optionally configures target-tracking autoscaling.

mod aws;
mod config;
mod output;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use deployer_lib::{
    parse_request, run_deployment, DeploymentOutcome, RawDeploymentInput, WaitConfig,
};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// ECS Service Deployer CLI
#[derive(Parser)]
#[command(name = "ecsd")]
#[command(author, version, about = "Deploy container images to ECS services", long_about = None)]
pub struct Cli {
    /// AWS region (falls back to ECSD_REGION, then us-east-1)
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy an image to a service
    Deploy(DeployArgs),
}

#[derive(Args)]
pub struct DeployArgs {
    /// Container image reference to deploy
    #[arg(long)]
    pub image: String,

    /// Target cluster (falls back to ECSD_CLUSTER)
    #[arg(long)]
    pub cluster: Option<String>,

    /// Target service
    #[arg(long)]
    pub service: String,

    /// Task definition family (defaults to the service name)
    #[arg(long)]
    pub family: Option<String>,

    /// Container to update within the task definition (defaults to the
    /// service name)
    #[arg(long)]
    pub container_name: Option<String>,

    /// Task-level CPU units
    #[arg(long, default_value_t = 256)]
    pub cpu: u32,

    /// Task-level memory in MB
    #[arg(long, default_value_t = 512)]
    pub memory: u32,

    /// Desired task count; omit to leave the current count alone
    #[arg(long)]
    pub desired_count: Option<i32>,

    /// Environment variables as a JSON array of {"name","value"} objects.
    /// Omit to keep the remote values; pass `[]` to clear them.
    #[arg(long)]
    pub env_vars: Option<String>,

    /// Secrets as a JSON array of {"name","valueFrom"} objects
    #[arg(long)]
    pub secrets: Option<String>,

    /// Mount points as a JSON array of
    /// {"containerPath","sourceVolume","readOnly"} objects
    #[arg(long)]
    pub mount_points: Option<String>,

    /// Volumes as a JSON array; each entry needs exactly one of
    /// "host" or "efsVolumeConfiguration"
    #[arg(long)]
    pub volumes: Option<String>,

    /// Configure service autoscaling after a successful deployment
    #[arg(long)]
    pub enable_autoscaling: bool,

    /// Minimum task count for autoscaling
    #[arg(long, default_value_t = 1)]
    pub min_capacity: i32,

    /// Maximum task count for autoscaling
    #[arg(long, default_value_t = 10)]
    pub max_capacity: i32,

    /// Target average CPU utilization percentage
    #[arg(long, default_value_t = 70.0)]
    pub target_cpu: f64,

    /// Target average memory utilization percentage
    #[arg(long, default_value_t = 80.0)]
    pub target_memory: f64,

    /// Scale-in cooldown in seconds
    #[arg(long, default_value_t = 300)]
    pub scale_in_cooldown: i32,

    /// Scale-out cooldown in seconds
    #[arg(long, default_value_t = 60)]
    pub scale_out_cooldown: i32,

    /// Seconds between stability checks
    #[arg(long, default_value_t = 15)]
    pub wait_interval: u64,

    /// Number of stability checks before giving up
    #[arg(long, default_value_t = 40)]
    pub wait_attempts: u32,

    /// Do not wait for the service to stabilize
    #[arg(long)]
    pub no_wait: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(fmt::layer().compact())
        .init();

    match cli.command {
        Commands::Deploy(args) => deploy(cli.region, args).await,
    }
}

async fn deploy(region_flag: Option<String>, args: DeployArgs) -> Result<()> {
    let defaults = config::DeployDefaults::load()?;
    let region = region_flag
        .or(defaults.region)
        .unwrap_or_else(|| "us-east-1".to_string());
    let cluster = args
        .cluster
        .or(defaults.cluster)
        .context("--cluster is required (or set ECSD_CLUSTER)")?;

    let input = RawDeploymentInput {
        cluster,
        service: args.service.clone(),
        family: args.family.unwrap_or_else(|| args.service.clone()),
        container_name: args.container_name.unwrap_or_else(|| args.service.clone()),
        image: args.image,
        cpu: Some(args.cpu),
        memory: Some(args.memory),
        desired_count: args.desired_count,
        environment_variables: args.env_vars,
        secrets: args.secrets,
        mount_points: args.mount_points,
        volumes: args.volumes,
        autoscaling_enabled: args.enable_autoscaling,
        min_capacity: args.min_capacity,
        max_capacity: args.max_capacity,
        target_cpu_utilization: Some(args.target_cpu),
        target_memory_utilization: Some(args.target_memory),
        scale_in_cooldown_secs: args.scale_in_cooldown,
        scale_out_cooldown_secs: args.scale_out_cooldown,
    };
    let request = parse_request(&input)?;
    info!(
        region = %region,
        cluster = %request.cluster,
        service = %request.service,
        "Resolved deployment target"
    );

    let wait = WaitConfig {
        interval: Duration::from_secs(args.wait_interval),
        max_attempts: if args.no_wait { 0 } else { args.wait_attempts },
    };

    let orchestrator = aws::AwsOrchestrator::connect(&region).await;

    // Ctrl-C aborts the stability wait; mutations already submitted are
    // never rolled back.
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    output::print_info(&format!(
        "Deploying {} to {}/{}",
        request.image, request.cluster, request.service
    ));

    let report = run_deployment(&orchestrator, &request, &wait, &mut shutdown_rx).await?;

    match report.outcome {
        DeploymentOutcome::Stable => {
            output::print_success(&format!(
                "Service {} is stable on revision {} ({})",
                request.service,
                report.revision.revision,
                chrono::Utc::now().to_rfc3339()
            ));
            Ok(())
        }
        DeploymentOutcome::TimedOut => {
            output::print_warning(&format!(
                "Revision {} registered and service updated, but the service \
                 did not stabilize before the wait budget ran out",
                report.revision.revision
            ));
            std::process::exit(2);
        }
        DeploymentOutcome::Cancelled => {
            output::print_warning(&format!(
                "Cancelled while waiting; revision {} and the service update remain in place",
                report.revision.revision
            ));
            std::process::exit(130);
        }
    }
}
