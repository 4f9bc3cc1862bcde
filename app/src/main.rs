use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

mod logging;

use api::ApiConfig;
use user::{auth::AuthConfig, UserDatabaseConfig, UserManager};

/// exptrack - personal finance tracker REST backend
#[derive(Parser, Debug)]
#[command(name = "exptrack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port for the HTTP API
    #[arg(short, long, env = "API_PORT")]
    port: Option<u16>,

    /// SQLite database file holding user records
    #[arg(long, env = "DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Directory for rolling log files
    #[arg(long, env = "LOG_DIR", default_value = "data/logs")]
    log_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let _guard =
        logging::init_logging(&cli.log_dir, level).context("Failed to initialize logging")?;

    info!("=== exptrack v{} starting ===", env!("CARGO_PKG_VERSION"));

    let auth_config = AuthConfig::from_env().context("Invalid authentication configuration")?;

    let mut db_config = UserDatabaseConfig::from_env().context("Invalid database configuration")?;
    if let Some(path) = cli.database {
        db_config.database_path = path;
    }

    let mut api_config = ApiConfig::from_env();
    if let Some(port) = cli.port {
        api_config = api_config.with_port(port);
    }

    let manager = UserManager::open(db_config, auth_config)
        .await
        .context("Failed to open user database")?;

    api::start_server_with_config(Arc::new(manager), api_config)
        .await
        .context("API server failed")?;

    logging::log_shutdown();
    Ok(())
}
