use anyhow::{Context, Result};
use courier_backend::config::CourierConfig;
use courier_backend::chat::ChatCore;
use courier_backend::runtime::{run_with_release, shutdown_signal, EventLoop, HeadlessSurface};
use courier_backend::server;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,courier_backend=debug")),
        )
        .init();

    let config = CourierConfig::load();
    tracing::info!(
        "Starting headless courier service (data dir: {}, bind: {})",
        config.data_dir,
        config.bind_addr
    );

    let server_rt = tokio::runtime::Runtime::new().context("failed to start server runtime")?;
    server_rt.block_on(async {
        let core = ChatCore::open(&config).context("failed to open message storage")?;
        let (request_tx, request_rx) = flume::unbounded();
        let listener = server::bind(&config.bind_addr).await?;
        let server = server::spawn_server(listener, request_tx);
        let event_loop = EventLoop::new(core, request_rx, HeadlessSurface, config.poll_interval());
        run_with_release(event_loop, server, shutdown_signal()).await
    })
}
