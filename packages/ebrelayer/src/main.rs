use std::sync::Arc;

use ebrelayer::api;
use ebrelayer::checkpoint::{CheckpointStore, MemoryCheckpointStore, PgCheckpointStore};
use ebrelayer::config::Config;
use ebrelayer::cosmos_client::CosmosClient;
use ebrelayer::submitter::{
    AttestationSubmitter, ClaimSigner, CosmosDestination, EthereumDestination,
};
use ebrelayer::watchers::{
    ChainWorker, CosmosSource, EthereumSource, WorkerManager, WorkerSettings,
};

fn main() -> eyre::Result<()> {
    // Install color-eyre for better error reporting
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    tracing::info!("Starting ebrelayer");

    let config = Config::load()?;
    tracing::info!(
        eth_chain_id = config.ethereum.chain_id,
        cosmos_chain_id = %config.cosmos.chain_id,
        "Configuration loaded"
    );

    let store: Arc<dyn CheckpointStore> = match &config.database.url {
        Some(url) => {
            let store = PgCheckpointStore::connect(url).await?;
            tracing::info!("Database connected, migrations complete");
            Arc::new(store)
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set; checkpoints are kept in memory and lost on restart"
            );
            Arc::new(MemoryCheckpointStore::new())
        }
    };

    let retry = config.relay.retry_config();
    let signer = ClaimSigner::from_private_key(&config.ethereum.private_key)?;
    tracing::info!(validator = %signer.address(), "Claim signer loaded");

    let cosmos_client = Arc::new(CosmosClient::new(&config.cosmos)?);

    let to_ethereum = Arc::new(AttestationSubmitter::new(
        Arc::new(EthereumDestination::new(&config.ethereum)?),
        signer.clone(),
        retry.clone(),
    ));
    let to_cosmos = Arc::new(AttestationSubmitter::new(
        Arc::new(CosmosDestination::new(
            cosmos_client,
            &config.cosmos.oracle_address,
        )),
        signer,
        retry,
    ));

    let status = api::new_status_board();

    let ethereum_worker = ChainWorker::new(
        Arc::new(EthereumSource::new(&config.ethereum)?),
        store.clone(),
        WorkerSettings {
            start_height: config.ethereum.start_block.unwrap_or(1),
            poll_interval: config.relay.poll_interval(),
            pending_retry_interval: config.relay.pending_retry_interval(),
        },
        status.clone(),
    )
    .with_submitter(to_cosmos);

    let cosmos_worker = ChainWorker::new(
        Arc::new(CosmosSource::new(&config.cosmos)?),
        store,
        WorkerSettings {
            start_height: config.cosmos.start_height.unwrap_or(1),
            poll_interval: config.relay.poll_interval(),
            pending_retry_interval: config.relay.pending_retry_interval(),
        },
        status.clone(),
    )
    .with_submitter(to_ethereum);

    let manager = WorkerManager::new(vec![ethereum_worker, cosmos_worker], status.clone());

    let api_addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.relay.api_port));
    tokio::spawn(async move {
        if let Err(e) = api::start_api_server(api_addr, status).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let workers = tokio::spawn(manager.run(shutdown_rx));

    tracing::info!("Workers started");

    wait_for_shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    // Workers finish their current block before exiting
    match workers.await {
        Ok(Err(e)) => tracing::error!(error = %e, "Worker manager error"),
        Err(e) => tracing::error!(error = %e, "Worker manager task failed"),
        Ok(Ok(())) => {}
    }

    tracing::info!("ebrelayer stopped");
    Ok(())
}

/// Initialize tracing/logging with structured output
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ebrelayer=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .with(filter)
            .init();
    }
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
