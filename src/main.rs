//! klg server entry point.
//!
//! Loads configuration, composes the binders and serves until SIGINT or
//! SIGTERM.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use klg::app::{App, shutdown_signal};
use klg::config::{AppConfig, LogConfig, LogEncoding};
use klg::crud::CrudBinder;
use klg::docs::DocsBinder;
use klg::monitor::MonitorBinder;
use klg::proxy::ProxyBinder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env().context("invalid configuration")?;

    // Initialize tracing
    init_tracing(&config.log);
    tracing::info!(
        host = %config.http.host,
        port = %config.http.port,
        storage = ?config.storage.backend,
        downstream = %config.proxy.downstream,
        "starting klg"
    );

    // Build binders
    let crud = CrudBinder::connect(&config.storage)
        .await
        .context("failed to initialise record storage")?;
    let proxy = ProxyBinder::new(&config.proxy.downstream, config.proxy.connect_timeout)
        .context("failed to initialise proxy")?;

    // Compose; the proxy goes last so its catch-all never shadows a route
    let mut builder = App::builder()
        .address(&config.http.host, &config.http.port)
        .binder(MonitorBinder::new(&config.http.monitor_paths))
        .binder(crud)
        .binder(DocsBinder)
        .binder(proxy);
    if let Some(timeout) = config.http.request_timeout {
        builder = builder.request_timeout(timeout);
    }
    let app = builder.build().context("failed to compose service")?;

    // Serve
    app.run(shutdown_signal()).await?;
    tracing::info!("--- Service stopped ---");

    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match log.encoding {
        LogEncoding::Json => subscriber.json().init(),
        LogEncoding::Console => subscriber.init(),
    }
}
