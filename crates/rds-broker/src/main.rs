//! rds-broker: multi-tenant RDS provisioning from the command line
//!
//! Every invocation assumes the broker role in the named tenant account with a
//! session policy scoped to the requested operation, runs the orchestration,
//! and prints the result as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rds_broker::aws::error::ApiError;
use rds_broker::aws::{AwsContext, RdsClient, RoleRequest, SessionBroker, StsClient};
use rds_broker::config::BrokerConfig;
use rds_broker::orchestrator::{
    CallContext, DatabaseCreateRequest, DatabaseModifyRequest, DatabaseOrchestrator,
    DatabaseStateRequest, SnapshotCreateRequest, SnapshotModifyRequest, SnapshotOrchestrator,
    TenantContext,
};
use rds_broker_common::Operation;
use rds_broker_common::policy::READ_ONLY_MANAGED_POLICY;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rds-broker")]
#[command(about = "Provision and manage RDS databases in tenant accounts")]
#[command(version)]
struct Args {
    /// Path to the broker configuration
    /// (default: <config dir>/rds-broker/config.json)
    #[arg(long, env = "RDS_BROKER_CONFIG")]
    config: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long)]
    json: bool,

    /// Abort the operation after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Tenant account name, as listed in the configuration
    account: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a cluster and/or instance (restores when a snapshot is named)
    Create {
        /// JSON request with Cluster and/or Instance
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Restore a cluster or instance from a snapshot
    Restore {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Modify a cluster or instance and/or its tags
    Modify {
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete an instance (and its emptied cluster) or a cluster
    Delete {
        id: String,
        /// Take final-<id> snapshots before deleting
        #[arg(long)]
        snapshot: bool,
    },

    /// Start or stop a database
    Power {
        id: String,
        /// start or stop
        state: String,
    },

    /// Describe a database
    Get {
        id: String,
        /// Include the cluster of the same name
        #[arg(long)]
        all: bool,
    },

    /// List databases in the account
    List {
        /// Include clusters
        #[arg(long)]
        all: bool,
    },

    /// Resolve the ARN(s) of a database
    Arn { id: String },

    /// Manage snapshots
    #[command(subcommand)]
    Snapshot(SnapshotCommand),
}

#[derive(Subcommand, Debug)]
enum SnapshotCommand {
    /// Snapshot a cluster or instance
    Create { db: String, snapshot_id: String },

    /// List snapshots of a database
    List { db: String },

    /// Describe a snapshot
    Get { id: String },

    /// Delete a snapshot
    Delete { id: String },

    /// Upgrade the engine version of an instance snapshot
    Modify { id: String, engine_version: String },

    /// Engine versions a snapshot can be restored or upgraded to
    Versions { id: String },

    /// Delete every manual snapshot except protected finals
    Purge,
}

impl Command {
    /// The operation whose session policy this command runs under
    fn operation(&self) -> Operation {
        match self {
            Command::Create { .. } => Operation::DatabaseCreate,
            Command::Restore { .. } => Operation::DatabaseRestore,
            Command::Modify { .. } => Operation::DatabaseModify,
            Command::Delete { .. } => Operation::DatabaseDelete,
            Command::Power { .. } => Operation::DatabasePower,
            Command::Get { .. } | Command::List { .. } | Command::Arn { .. } => {
                Operation::DatabaseRead
            }
            Command::Snapshot(cmd) => match cmd {
                SnapshotCommand::Create { .. } => Operation::SnapshotCreate,
                SnapshotCommand::List { .. } | SnapshotCommand::Get { .. } => {
                    Operation::SnapshotRead
                }
                SnapshotCommand::Delete { .. } | SnapshotCommand::Purge => {
                    Operation::SnapshotDelete
                }
                SnapshotCommand::Modify { .. } => Operation::SnapshotModify,
                SnapshotCommand::Versions { .. } => Operation::SnapshotVersions,
            },
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    match e.downcast_ref::<ApiError>() {
        Some(api) => {
            let kind = api.kind();
            let _ = writeln!(
                stderr,
                "\n\x1b[1;31mError:\x1b[0m [{kind} {}] {}",
                kind.http_status(),
                api.message()
            );
        }
        None => {
            let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");
        }
    }

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        // Reduce noise from AWS SDK (show only warnings and errors)
        .add_directive("aws_config=warn".parse()?)
        .add_directive("aws_smithy_runtime=warn".parse()?);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn read_request<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse request file: {}", path.display()))
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json)?;

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => BrokerConfig::default_path().context("Failed to determine config directory")?,
    };
    let config = BrokerConfig::load(&config_path)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling operation");
                cancel.cancel();
            }
        }
    });
    let mut ctx = CallContext::new(cancel);
    if let Some(secs) = args.timeout {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    let operation = args.command.operation();
    let mut role = RoleRequest::new(config.role_arn_for(&args.account)?)
        .with_inline_policy(operation.policy())
        .with_managed_policy_arns([READ_ONLY_MANAGED_POLICY]);
    if let Some(external_id) = &config.external_id {
        role = role.with_external_id(external_id.clone());
    }

    info!(
        account = %args.account,
        org = %config.org,
        region = %config.region,
        %operation,
        "Starting broker operation"
    );

    let aws = AwsContext::new(&config.region).await;
    let sessions = SessionBroker::new(StsClient::from_context(&aws), config.org.clone());
    let session = sessions.assume(&ctx, &role).await?;
    let tenant_aws = AwsContext::from_session(&config.region, &session).await;
    let rds = RdsClient::from_context(&tenant_aws);
    let tenant = config.tenant();

    let output = execute(&rds, &tenant, &ctx, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

async fn execute(
    rds: &RdsClient,
    tenant: &TenantContext,
    ctx: &CallContext,
    command: Command,
) -> Result<serde_json::Value> {
    let databases = DatabaseOrchestrator::new(rds, tenant);
    let snapshots = SnapshotOrchestrator::new(rds, tenant);

    let value = match command {
        Command::Create { file } => {
            let request: DatabaseCreateRequest = read_request(&file)?;
            serde_json::to_value(databases.create(ctx, &request).await?)?
        }
        Command::Restore { file } => {
            let request: DatabaseCreateRequest = read_request(&file)?;
            serde_json::to_value(databases.restore(ctx, &request).await?)?
        }
        Command::Modify { id, file } => {
            let request: DatabaseModifyRequest = read_request(&file)?;
            serde_json::to_value(databases.modify(ctx, &id, &request).await?)?
        }
        Command::Delete { id, snapshot } => {
            serde_json::to_value(databases.delete(ctx, &id, snapshot).await?)?
        }
        Command::Power { id, state } => {
            let request = DatabaseStateRequest { state };
            serde_json::to_value(databases.set_state(ctx, &id, &request).await?)?
        }
        Command::Get { id, all } => serde_json::to_value(databases.get(ctx, &id, all).await?)?,
        Command::List { all } => serde_json::to_value(databases.list(ctx, all).await?)?,
        Command::Arn { id } => serde_json::to_value(databases.resolve_arn(ctx, &id).await?)?,
        Command::Snapshot(cmd) => match cmd {
            SnapshotCommand::Create { db, snapshot_id } => {
                let request = SnapshotCreateRequest {
                    snapshot_identifier: snapshot_id,
                };
                serde_json::to_value(snapshots.create(ctx, &db, &request).await?)?
            }
            SnapshotCommand::List { db } => {
                let list = snapshots.list(ctx, &db).await?;
                info!(items = list.items, "Listed snapshots");
                serde_json::to_value(list)?
            }
            SnapshotCommand::Get { id } => serde_json::to_value(snapshots.get(ctx, &id).await?)?,
            SnapshotCommand::Delete { id } => {
                serde_json::to_value(snapshots.delete(ctx, &id).await?)?
            }
            SnapshotCommand::Modify { id, engine_version } => {
                let request = SnapshotModifyRequest { engine_version };
                serde_json::to_value(snapshots.modify(ctx, &id, &request).await?)?
            }
            SnapshotCommand::Versions { id } => {
                serde_json::to_value(snapshots.versions(ctx, &id).await?)?
            }
            SnapshotCommand::Purge => serde_json::to_value(snapshots.purge(ctx).await?)?,
        },
    };

    Ok(value)
}
