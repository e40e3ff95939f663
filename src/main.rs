//! Price relay service: multicast feed in, WebSocket price updates out.
//!
//! Configuration comes from the environment, see [`price_relay::RelayConfig::from_env`].

use log::{error, info};
use price_relay::receiver::wait_for_shutdown;
use price_relay::{api, relay, BroadcastSink, RelayConfig, RelayStats};
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let _ = env_logger::try_init();
    let config = match RelayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let sink = BroadcastSink::new(config.broadcast_capacity);
    let stats = RelayStats::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = api::create_router(api::AppState::new(sink.clone(), stats.clone(), config.x_axis));
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = TcpListener::bind(&addr).await.expect("bind");
    info!("listening on http://{}", addr);

    let mut http_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move { wait_for_shutdown(&mut http_shutdown).await })
            .await
    });

    let relay_task = relay::run(&config, sink, stats, shutdown_rx);
    tokio::pin!(relay_task);
    let relay_result = tokio::select! {
        result = &mut relay_task => result,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    info!("shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => error!("cannot listen for ctrl-c, running until the relay stops: {}", e),
            }
            (&mut relay_task).await
        }
    };

    // Relay is done either way; take the HTTP side down with it.
    let _ = shutdown_tx.send(true);
    let server_result = server.await;

    // `supervise` has already logged whatever fault ended the relay.
    if relay_result.is_err() {
        std::process::exit(1);
    }
    if let Ok(Err(e)) = server_result {
        error!("http server failed: {}", e);
        std::process::exit(1);
    }
}
