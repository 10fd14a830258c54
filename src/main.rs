use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn, Level};

use floodgate::config::routes_from_file;
use floodgate::router::Router;

/// Routes used when no configuration file is given on the command line.
const SAMPLE_ROUTES: &str = r#"
- path: /api/v1/users
  limiter:
    type: fixed_window
    params:
      capacity: 5
      reset_interval: 10
- path: /api/v1/search
  limiter:
    type: token_bucket
    params:
      capacity: 20
      refill_rate: 2
      request_cost: 1
  traffic:
    type: leaky_bucket
    params:
      capacity: 50
      drop_per_second: 10
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Floodgate Admission Control");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let mut router = Router::new();
    match std::env::args().nth(1) {
        Some(path) => {
            let routes = routes_from_file(&path)?;
            for route in &routes {
                router.add_route(route, &shutdown_rx)?;
            }
        }
        None => {
            info!("No routes file given, using built-in sample routes");
            router.load_from_yaml(SAMPLE_ROUTES, &shutdown_rx)?;
        }
    }
    let router = Arc::new(router);

    // Fire a burst of sample traffic through one route to show the pipeline
    // in action.
    let mut workers = Vec::new();
    for i in 0..20 {
        let router = router.clone();
        workers.push(tokio::spawn(async move {
            let pipeline = match router.eval_route("/api/v1/users") {
                Some(pipeline) => pipeline,
                None => {
                    warn!("Route not found");
                    return;
                }
            };
            match pipeline.handle_request("demo-client").await {
                Ok(mut response) => {
                    let allowed = response.allowed().await;
                    info!(request = i + 1, allowed = allowed, "Request evaluated");
                }
                Err(e) => warn!(error = %e, "Request failed"),
            }
        }));
    }
    for worker in workers {
        let _ = worker.await;
    }

    info!("Waiting for shutdown signal (Ctrl+C)");
    shutdown_signal().await;

    // Stop the traffic shapers; still-queued requests are abandoned.
    let _ = shutdown_tx.send(());
    info!("Floodgate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
