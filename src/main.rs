//! Pickup lifecycle daemon wiring the listing store, Telegram, timers and the health endpoint.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::{net::TcpListener, sync::mpsc};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pickup_lifecycle::{
    config::{AppConfig, StoreKind},
    dao::listing_store::{InMemoryListingStore, ListingStore},
    jobs::{TokioJobQueue, spawn_periodic},
    platform::telegram::{TelegramClient, TelegramConfig, UpdatePoller},
    routes,
    services::{expiry, membership, scheduler, storage_supervisor},
    state::{AppState, SharedState, clock::SystemClock},
};

/// Buffered membership events before the poller waits for the consumer.
const MEMBERSHIP_EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let clock = Arc::new(SystemClock::new(config.utc_offset()));
    let store = connect_store(config.store).await?;

    let telegram = TelegramConfig::from_env().context("reading Telegram configuration")?;
    let client = TelegramClient::new(telegram).context("building Telegram client")?;

    let (jobs, fired) = TokioJobQueue::new(clock.clone());
    let state = AppState::new(
        store,
        Arc::new(client.clone()),
        Arc::new(jobs),
        clock,
        config.settings(),
    );

    tokio::spawn(scheduler::run_dispatcher(state.clone(), fired));
    match scheduler::recover(&state).await {
        Ok(report) => info!(?report, "notifications recovered"),
        Err(err) => warn!(error = %err, "notification recovery failed"),
    }
    if let Err(err) = membership::reconcile_all(&state).await {
        warn!(error = %err, "startup reconciliation failed");
    }

    let (events_tx, events_rx) = mpsc::channel(MEMBERSHIP_EVENT_BUFFER);
    tokio::spawn(UpdatePoller::new(client).run(events_tx));
    tokio::spawn(membership::run_event_consumer(state.clone(), events_rx));

    spawn_periodic("expiry_sweep", config.expiry_interval, {
        let state = state.clone();
        move || expiry::run_sweep(state.clone())
    });
    spawn_periodic("reconciliation", config.reconcile_interval, {
        let state = state.clone();
        move || {
            let state = state.clone();
            async move {
                if let Err(err) = membership::reconcile_all(&state).await {
                    warn!(error = %err, "reconciliation could not list open listings");
                }
            }
        }
    });
    tokio::spawn(storage_supervisor::run(state.clone()));

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.health_port));
    info!(%addr, "starting health endpoint");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

async fn connect_store(kind: StoreKind) -> anyhow::Result<Arc<dyn ListingStore>> {
    match kind {
        StoreKind::Memory => {
            warn!("using in-memory listing store; listings are lost on restart");
            Ok(Arc::new(InMemoryListingStore::new()))
        }
        #[cfg(feature = "mongo-store")]
        StoreKind::Mongo => {
            use pickup_lifecycle::dao::listing_store::mongodb::{MongoConfig, MongoListingStore};

            let config = MongoConfig::from_env()
                .await
                .context("reading MongoDB configuration")?;
            let store = MongoListingStore::connect(config)
                .await
                .context("connecting to MongoDB")?;
            info!("connected to MongoDB");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongo-store"))]
        StoreKind::Mongo => anyhow::bail!("built without the `mongo-store` feature"),
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state).layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the daemon down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
