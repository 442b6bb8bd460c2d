use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};

use weblayer::{Config, build_router, logging, shutdown};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the demo server, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    let config = match Config::from_env() {
        Ok(config) => {
            logging::init_logging(&config);
            config
        }
        Err(e) => {
            logging::init_logging(&Config::default());
            error!("Configuration error: {e}");
            return Err(exitcode::CONFIG);
        }
    };

    info!("Starting weblayer demo v{}", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.host,
        port = %config.port,
        log_format = %config.log_format,
        request_id_header = %config.request_id_header,
        "Configuration loaded"
    );

    let app = build_router(&config).map_err(|e| {
        error!("Failed to build router: {e}");
        exitcode::CONFIG
    })?;

    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  GET  /health      - Health check");
    info!("  POST /echo/form   - Echo form parameters");
    info!("  POST /echo/json   - Echo JSON body");
    info!("  POST /greet       - Typed JSON body");
    info!("  GET  /env         - Request env");
    info!("  GET  /panic       - Recovered panic");
    info!("  GET  /fail        - Internal error");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!("Server shutdown complete");
    Ok(())
}
