//! Headless backup and restore for the site content store.

mod commands;

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use site_admin_core::archive::SiteArchiver;
use site_admin_core::config::StoreConfig;
use site_admin_core::store::postgres::{PgBlobStore, PgPartitionStore};
use tracing_subscriber::EnvFilter;

/// Site admin command line: back up, list and restore site content.
#[derive(Parser, Debug)]
#[command(name = "site-admin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Comma-separated partitions to back up (overrides BACKUP_PARTITIONS)
    #[arg(long, global = true)]
    partitions: Option<String>,

    /// Bucket holding backups (overrides BACKUP_BUCKET)
    #[arg(long, global = true)]
    bucket: Option<String>,

    /// Deadline in seconds for each remote call (overrides REMOTE_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// The subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Snapshot every configured partition into a new backup
    Backup,

    /// List stored backups, newest first
    List,

    /// Replace site content with a stored backup
    Restore {
        /// Backup name as shown by `list`
        name: String,

        /// Skip the interactive confirmation
        #[arg(long)]
        yes: bool,
    },
}

impl Cli {
    /// Flag values keyed by the environment variable they override.
    fn overrides(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        if let Some(url) = &self.database_url {
            vars.insert("DATABASE_URL", url.clone());
        }
        if let Some(partitions) = &self.partitions {
            vars.insert("BACKUP_PARTITIONS", partitions.clone());
        }
        if let Some(bucket) = &self.bucket {
            vars.insert("BACKUP_BUCKET", bucket.clone());
        }
        if let Some(secs) = self.timeout_secs {
            vars.insert("REMOTE_TIMEOUT_SECS", secs.to_string());
        }
        vars
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let overrides = cli.overrides();
    let config = StoreConfig::from_lookup(&|name: &str| {
        overrides.get(name).cloned().or_else(|| env::var(name).ok())
    })
    .map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    let pool = config
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {e}"))?;
    let partitions = PgPartitionStore::new(pool.clone(), config.partitions.clone())?;
    let archiver = SiteArchiver::new(
        Arc::new(partitions),
        Arc::new(PgBlobStore::new(pool)),
        config.archive_settings(),
    );

    match cli.command {
        Command::Backup => commands::backup(&archiver).await,
        Command::List => commands::list(&archiver).await,
        Command::Restore { name, yes } => commands::restore(&archiver, &name, yes).await,
    }
}
