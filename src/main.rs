mod config;
mod db;
mod error;
mod normalize;
mod query;
mod rotation;
mod scheduler;
mod types;
mod walker;

use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::db::Store;
use crate::error::Result;
use crate::query::load_clients;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // One shared connection, reused across strictly sequential cycles.
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&cfg.database_url())
        .await?;
    let store = Store::new(pool);
    store.bootstrap().await?;
    info!(
        "Database ready at {}:{}/{}",
        cfg.db_host, cfg.db_port, cfg.db_name
    );

    let clients = load_clients(&cfg)?;
    info!("Loaded {} credentialed query client(s)", clients.len());

    Scheduler::new(cfg, store, clients).run().await
}
