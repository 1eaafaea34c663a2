use clap::Parser;
use ledger_node::{api, config::Args, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let args = Args::parse();
    let state = AppState::from_args(&args)?;
    info!(
        node_id = %state.node_id,
        difficulty = state.pow.difficulty(),
        peers = args.peers.len(),
        "node starting"
    );

    let app = api::router(state);
    let listener = TcpListener::bind(args.listen).await?;
    info!("ledger-node listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
