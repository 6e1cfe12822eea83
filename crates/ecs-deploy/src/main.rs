//! ecs-deploy: provision, update, and roll back a Fargate service
//!
//! `deploy` reads its parameters from the environment (and `.env`), builds
//! the whole resource chain, and writes a manifest. `rollback` and
//! `update-service` work from a manifest.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ecs_deploy::aws::{
    AwsContext, EcsClient, ElbClient, FromAwsContext, LogsClient, verify_account,
};
use ecs_deploy::config::{ClientSettings, DeployConfig};
use ecs_deploy::deploy::{CloudServices, DeploymentPlan, Deployer};
use ecs_deploy::dns::CloudflareClient;
use ecs_deploy::report::CleanupResult;
use ecs_deploy::rollback::rollback_from_file;
use ecs_deploy::store::ManifestStore;
use ecs_deploy::update::{UpdateRequest, update_service};
use ecs_deploy_common::{DeploymentManifest, TaskSize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Log filter used when RUST_LOG is unset
const DEFAULT_LOG_FILTER: &str = "info,aws_config=warn,aws_sdk=warn,aws_smithy=warn,hyper=warn";

#[derive(Parser, Debug)]
#[command(name = "ecs-deploy")]
#[command(about = "Deploy a container to ECS Fargate behind an ALB, with a Cloudflare CNAME")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct UpdateArgs {
    /// Deployment manifest of the service to update
    manifest: PathBuf,

    /// New image tag (repository and image name are kept)
    #[arg(long)]
    image_tag: String,

    /// Task CPU units: 256, 512, 1024, 2048, or 4096
    #[arg(long)]
    cpu: String,

    /// Task memory in MiB: 512, 1024, 2048, 4096, or 8192
    #[arg(long)]
    memory: String,

    /// AWS region (default: the manifest's region, then $AWS_REGION)
    #[arg(long)]
    region: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision every resource and write a deployment manifest
    Deploy,

    /// Delete every resource recorded in a deployment manifest
    Rollback {
        /// Deployment manifest to roll back
        manifest: PathBuf,

        /// AWS region (default: the manifest's region, then $AWS_REGION)
        #[arg(long)]
        region: Option<String>,
    },

    /// Point a deployed service at a new image tag and task size
    UpdateService(UpdateArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // Help and version go to stdout and are not failures
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    let dotenv = dotenvy::dotenv();
    init_tracing();
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to load .env file"),
    }

    if let Err(e) = run(args).await {
        print_error(&e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if let Some(hint) = e
        .chain()
        .find_map(|cause| cause.downcast_ref::<ecs_deploy::aws::AwsError>())
        .and_then(|aws| aws.suggestion())
    {
        let _ = writeln!(stderr, "\n\x1b[2mHint:\x1b[0m {hint}");
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Deploy => handle_deploy().await,
        Command::Rollback { manifest, region } => handle_rollback(&manifest, region).await,
        Command::UpdateService(update) => handle_update(update).await,
    }
}

/// Pick the region for manifest-driven commands
fn resolve_region(
    flag: Option<String>,
    manifest: &DeploymentManifest,
    settings: &ClientSettings,
) -> Result<String> {
    flag.or_else(|| manifest.region.clone())
        .or_else(|| settings.region.clone())
        .context("No AWS region: pass --region or set AWS_REGION")
}

fn load_manifest(path: &Path) -> Result<DeploymentManifest> {
    DeploymentManifest::load(path)
        .with_context(|| format!("Unusable deployment manifest '{}'", path.display()))
}

/// Handle the deploy command
async fn handle_deploy() -> Result<()> {
    let config = DeployConfig::from_env().context("Invalid deploy configuration")?;
    info!(
        project = %config.project_name,
        region = %config.region,
        image = %config.image(),
        size = %config.task_size,
        "Loaded deploy configuration"
    );

    let aws = AwsContext::new(
        &config.region,
        Some(&config.credentials),
        config.request_timeout,
    )
    .await;
    let account = verify_account(aws.sdk_config()).await?;
    info!(account = %account, region = %config.region, "Deploying with validated credentials");

    let logs = LogsClient::from_context(&aws);
    let elb = ElbClient::from_context(&aws);
    let ecs = EcsClient::from_context(&aws);
    let dns = CloudflareClient::new(config.dns_api_token.clone(), config.request_timeout)
        .context("Failed to build the DNS API client")?;

    let plan = DeploymentPlan::from_config(&config);
    let store = ManifestStore::new(&config.deployments_dir);
    let services = CloudServices {
        logs: &logs,
        elb: &elb,
        ecs: &ecs,
        dns: &dns,
    };

    match Deployer::new(services, &plan, &store).run().await {
        Ok(report) => {
            println!("{}", report.to_table());
            if let Some(path) = &report.manifest_path {
                println!("\nManifest written to {}", path.display());
            }
            Ok(())
        }
        Err(halted) => {
            if !halted.report.entries.is_empty() {
                eprintln!("\nCreated before the failure, not recorded in any manifest:");
                eprintln!("{}", halted.report.to_table());
            }
            Err(halted.into())
        }
    }
}

/// Handle the rollback command
async fn handle_rollback(manifest_path: &Path, region: Option<String>) -> Result<()> {
    let report = rollback_from_file(manifest_path, |manifest| {
        let prepared = ClientSettings::from_env()
            .context("Invalid client configuration")
            .and_then(|settings| {
                let region = resolve_region(region, manifest, &settings)?;
                Ok((settings, region))
            });
        let dns_token = manifest.dns_api_token.clone();

        async move {
            let (settings, region) = prepared?;
            info!(region = %region, "Rolling back deployment");

            let aws = AwsContext::new(
                &region,
                settings.credentials.as_ref(),
                settings.request_timeout,
            )
            .await;
            let dns = CloudflareClient::new(dns_token, settings.request_timeout)
                .context("Failed to build the DNS API client")?;
            Ok::<_, anyhow::Error>((
                ElbClient::from_context(&aws),
                EcsClient::from_context(&aws),
                dns,
            ))
        }
    })
    .await?;

    println!("{}", report.to_table());
    println!(
        "\nDeleted: {}, already gone: {}, skipped: {}, failed: {}",
        report.count(CleanupResult::Deleted),
        report.count(CleanupResult::AlreadyDeleted),
        report.count(CleanupResult::Skipped),
        report.failed_count(),
    );
    Ok(())
}

/// Handle the update-service command
async fn handle_update(args: UpdateArgs) -> Result<()> {
    let size = TaskSize::new(&args.cpu, &args.memory)?;
    let manifest = load_manifest(&args.manifest)?;
    let settings = ClientSettings::from_env().context("Invalid client configuration")?;
    let region = resolve_region(args.region, &manifest, &settings)?;

    let aws = AwsContext::new(
        &region,
        settings.credentials.as_ref(),
        settings.request_timeout,
    )
    .await;
    let account = verify_account(aws.sdk_config()).await?;
    info!(
        account = %account,
        region = %region,
        service = %manifest.service_name,
        "Updating with validated credentials"
    );

    let ecs = EcsClient::from_context(&aws);
    let store = ManifestStore::for_manifest(&args.manifest, &settings.deployments_dir);
    let request = UpdateRequest {
        image_tag: args.image_tag,
        size,
    };

    let outcome = update_service(&ecs, &store, &manifest, &request).await?;

    println!(
        "Service {} now runs {} ({}{})",
        manifest.service_name,
        outcome.image,
        outcome.task_definition,
        if outcome.reused { ", existing revision" } else { "" },
    );
    println!("Manifest written to {}", outcome.manifest_path.display());
    Ok(())
}
