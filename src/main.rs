use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use ballotd::config::{Cli, Config, StoreBackend};
use ballotd::proto::voting::v1::voting_service_server::VotingServiceServer;
use ballotd::service::VotingService;
use ballotd::store::{DynamoStore, MemoryStore, VoteStore};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    run_server(cli.config).await
}

async fn run_server(mut config: Config) -> Result<()> {
    config.resolve_secrets()?;

    let store: Arc<dyn VoteStore> = match config.store {
        StoreBackend::Dynamodb => Arc::new(DynamoStore::connect(&config).await),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };

    // Table provisioning happens here, before the listener comes up.
    let service = VotingService::provision(store).await?;

    info!(bind = %config.bind, "starting ballotd");
    tonic::transport::Server::builder()
        .add_service(VotingServiceServer::new(service))
        .serve_with_shutdown(config.bind, shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).compact().init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
