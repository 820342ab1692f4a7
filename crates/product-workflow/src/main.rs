use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use product_workflow::{config::Config, server::Server, store::create_store};

#[derive(Debug, Parser)]
#[command(name = "product-workflow", version, about = "Workflow templates and product positions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations and serve HTTP (default)
    Serve {
        /// Listen address, overrides SERVER_ADDR
        #[arg(long)]
        addr: Option<String>,
    },
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter: {}", config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(
        "Loaded configuration: server={} database={:?}",
        config.server.addr, config.database.db_type
    );

    // Initialize store
    let store = create_store(&config.database)
        .await
        .context("failed to open database")?;
    store.init().await.context("failed to run migrations")?;

    match cli.command.unwrap_or(Command::Serve { addr: None }) {
        Command::Migrate => {
            info!("Migrations applied");
        }
        Command::Serve { addr } => {
            if let Some(addr) = addr {
                config.server.addr = addr;
            }
            let server = Server::new(store).context("failed to build server")?;

            info!("Starting server on {}", config.server.addr);
            server.start(&config.server.addr).await?;
        }
    }

    Ok(())
}
