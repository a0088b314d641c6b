// Station ingest server: paced producer, windowed consumer, and stats surface over one sample ring.

use tracing::{error, info, warn};

use station_ingest_server::app::AppState;
use station_ingest_server::config::StationSettings;
use station_ingest_server::http;
use station_ingest_server::tasks;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let settings = match StationSettings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            error!(%err, "invalid station settings");
            std::process::exit(2);
        }
    };
    let addr = settings.http_addr;

    let app_state = match AppState::new(settings) {
        Ok(app_state) => app_state,
        Err(err) => {
            error!(%err, "failed to allocate sample ring");
            std::process::exit(2);
        }
    };

    let handles = tasks::spawn_pipeline(&app_state);

    let signal_state = app_state.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => signal_state.trigger_shutdown("ctrl-c"),
            Err(err) => warn!(?err, "failed to listen for ctrl-c"),
        }
    });

    let mut server_shutdown = app_state.shutdown_rx();
    let app = http::router(app_state.clone());

    info!(%addr, "starting server");
    let served = match axum::Server::try_bind(&addr) {
        Ok(builder) => {
            builder
                .serve(app.into_make_service())
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.wait_for(|stopped| *stopped).await;
                })
                .await
        }
        Err(err) => Err(err),
    };
    if let Err(err) = served {
        warn!(?err, "server exited");
        app_state.trigger_shutdown("server exited");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            warn!(?err, "pipeline task panicked");
        }
    }

    let stats = app_state.stats_snapshot().await;
    info!(
        written = stats.ring.written,
        dropped = stats.ring.dropped,
        read = stats.ring.read,
        gaps = stats.ring.gaps,
        windows = stats.consumer.windows,
        halted = stats.halted.as_deref().unwrap_or("no"),
        "station ingest stopped"
    );
}
