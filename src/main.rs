mod ui;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use courier_backend::chat::ChatCore;
use courier_backend::config::CourierConfig;
use courier_backend::runtime::{run_with_release, shutdown_signal, EventLoop};
use courier_backend::server;

use ui::input::spawn_stdin_keys;
use ui::terminal::TerminalSurface;

fn main() {
    // stdout belongs to the operator screen.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,courier=debug,courier_backend=debug")),
        )
        .init();

    tracing::info!("Courier starting...");

    if let Err(e) = run(CourierConfig::load()) {
        tracing::error!("Courier stopped: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: CourierConfig) -> Result<()> {
    tracing::info!(
        "Data dir: {}, bind: {}, default recipient: {}",
        config.data_dir,
        config.bind_addr,
        config.default_recipient
    );

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(async {
        let core = ChatCore::open(&config).context("failed to open message storage")?;
        let (request_tx, request_rx) = flume::unbounded();
        let listener = server::bind(&config.bind_addr).await?;
        let server = server::spawn_server(listener, request_tx);

        let keys = spawn_stdin_keys();
        let event_loop = EventLoop::new(
            core,
            request_rx,
            TerminalSurface::stdout(),
            config.poll_interval(),
        )
        .with_keys(keys);
        run_with_release(event_loop, server, shutdown_signal()).await
    })
}
