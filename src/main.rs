//!
//! Voltra EV backend operational core: OTP authentication, station
//! discovery, and the pairing registry behind one REST API.
//! Configuration comes from the environment.

use std::sync::Arc;
use std::time::Duration;

use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use voltra_backend::application::audit::AuditLogger;
use voltra_backend::application::bloom::PhoneExistenceFilter;
use voltra_backend::application::discovery::StationDiscoveryService;
use voltra_backend::application::geo::StationGeoIndex;
use voltra_backend::application::listing::PairedDeviceListingService;
use voltra_backend::application::otp::{OtpService, SessionService};
use voltra_backend::application::pairing::PairingService;
use voltra_backend::application::phone_cache::PhoneVerificationCache;
use voltra_backend::application::rate_limit::RateLimiter;
use voltra_backend::application::sms_queue::{SmsQueue, SmsWorker};
use voltra_backend::domain::RepositoryProvider;
use voltra_backend::infrastructure::kv::{KvStore, MemoryKv};
use voltra_backend::infrastructure::sms::{ConsoleSmsProvider, RetryingSmsProvider, SmsProvider};
use voltra_backend::shared::shutdown::{Shutdown, ShutdownController};
use voltra_backend::{
    create_api_router, init_database, AppConfig, AppState, Migrator, SeaOrmRepositoryProvider,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Configuration & logging ────────────────────────────────
    let config = AppConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting Voltra backend core...");

    // ── Prometheus metrics recorder (must be installed before any metrics calls) ──
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    info!("📊 Prometheus metrics recorder installed");

    // ── Store adapters (init order: stores → bloom → sms → queue → http) ──
    let db = match init_database(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    info!("Running database migrations...");
    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run migrations: {}", e);
        return Err(e.into());
    }
    info!("Migrations completed");

    let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());

    // ── Phone existence filter ─────────────────────────────────
    let bloom = Arc::new(PhoneExistenceFilter::new(
        Arc::clone(&kv),
        config.bloom.clone(),
    ));
    match bloom.load_snapshot().await {
        Ok(true) => info!("Bloom snapshot loaded"),
        Ok(false) => {
            info!("No bloom snapshot; scheduling initial population");
            let bloom = Arc::clone(&bloom);
            let repos = Arc::clone(&repos);
            tokio::spawn(async move {
                match bloom.populate_from_users(repos.users()).await {
                    Ok(total) => info!(total, "Initial bloom population complete"),
                    Err(e) => warn!("Initial bloom population failed: {}", e),
                }
            });
        }
        Err(e) => warn!("Bloom snapshot load failed: {}", e),
    }

    // ── Core services ──────────────────────────────────────────
    let limiter = Arc::new(RateLimiter::new(Arc::clone(&kv)));
    let audit = Arc::new(AuditLogger::new(Arc::clone(&repos)));
    let phone_cache = Arc::new(PhoneVerificationCache::new(
        Arc::clone(&kv),
        Arc::clone(&bloom),
        Arc::clone(&repos),
        config.phone_cache.clone(),
    ));
    let sessions = Arc::new(SessionService::new(
        Arc::clone(&kv),
        Arc::clone(&repos),
        Arc::clone(&audit),
        config.jwt.clone(),
    ));
    let queue = Arc::new(SmsQueue::new(Arc::clone(&kv), config.sms_queue.clone()));
    let otp = Arc::new(OtpService::new(
        Arc::clone(&kv),
        Arc::clone(&limiter),
        Arc::clone(&phone_cache),
        Arc::clone(&audit),
        Arc::clone(&sessions),
        Arc::clone(&queue),
        Arc::clone(&repos),
        config.otp.clone(),
    ));

    let geo = Arc::new(StationGeoIndex::new(Arc::clone(&kv)));
    let discovery = Arc::new(StationDiscoveryService::new(
        Arc::clone(&kv),
        Arc::clone(&geo),
        Arc::clone(&repos),
        config.discovery.clone(),
    ));
    let listing = Arc::new(PairedDeviceListingService::new(
        Arc::clone(&kv),
        Arc::clone(&repos),
        config.listing.clone(),
    ));
    let pairing = Arc::new(PairingService::new(
        Arc::clone(&kv),
        Arc::clone(&repos),
        Arc::clone(&listing),
    ));

    // ── Shutdown coordination ──────────────────────────────────
    let shutdown = ShutdownController::new(config.server.shutdown_timeout_secs);
    let stop = shutdown.handle();
    shutdown.spawn_signal_watcher();

    // ── SMS queue workers ──────────────────────────────────────
    let provider: Arc<dyn SmsProvider> =
        Arc::new(RetryingSmsProvider::new(Box::new(ConsoleSmsProvider)));
    let worker = Arc::new(SmsWorker::new(
        Arc::clone(&queue),
        provider,
        Arc::clone(&audit),
        config.worker_concurrency,
    ));
    let worker_handles = worker.start(stop.clone());

    // ── Background maintenance tasks ───────────────────────────
    if config.populate_geo_index {
        tokio::spawn(populate_geo_index(Arc::clone(&repos), Arc::clone(&geo)));
    }
    tokio::spawn(bloom_refresh_loop(
        Arc::clone(&bloom),
        Arc::clone(&repos),
        stop.clone(),
        config.bloom.refresh_hours,
    ));

    // ── REST API server with graceful shutdown ─────────────────
    let app_state = AppState {
        otp,
        sessions,
        discovery,
        pairing,
        listing,
        db: db.clone(),
        kv,
        prometheus: prometheus_handle,
    };
    let router = create_api_router(app_state);

    let address = config.server.address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("REST API server listening on http://{}", address);

    let api_stop = stop.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            api_stop.wait().await;
            info!("REST API server stopping");
        })
        .await?;

    // ── Drain workers, then close stores ───────────────────────
    // The server can also exit on a bind/IO error; make sure the flag is
    // set so the drain below does not wait forever.
    shutdown.request_stop();
    let drained = shutdown
        .drain_within_grace(async {
            for handle in worker_handles {
                if let Err(e) = handle.await {
                    warn!("Worker task join failed: {}", e);
                }
            }
        })
        .await;
    if !drained {
        warn!("SMS workers did not drain before the grace period elapsed");
    }

    if let Err(e) = db.close().await {
        warn!("Error closing database connection: {}", e);
    } else {
        info!("✅ Database connection closed");
    }

    info!("Voltra backend shutdown complete");
    Ok(())
}

/// Load every station from the relational store into the geo index.
async fn populate_geo_index(repos: Arc<dyn RepositoryProvider>, geo: Arc<StationGeoIndex>) {
    const PAGE: u64 = 500;
    let mut offset = 0u64;
    let mut total = 0u64;

    loop {
        let page = match repos.stations().list_page(offset, PAGE).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Geo index population aborted: {}", e);
                return;
            }
        };
        if page.is_empty() {
            break;
        }
        total += page.len() as u64;
        offset += page.len() as u64;
        if let Err(e) = geo.batch_add(&page).await {
            warn!("Geo index batch load failed: {}", e);
            return;
        }
    }

    info!(total, "Geo index populated from station table");
}

/// Rebuild the bloom filter from the user table on the configured cadence.
async fn bloom_refresh_loop(
    bloom: Arc<PhoneExistenceFilter>,
    repos: Arc<dyn RepositoryProvider>,
    stop: Shutdown,
    refresh_hours: i64,
) {
    let interval = Duration::from_secs((refresh_hours.max(1) as u64) * 3600);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop.wait() => {
                info!("Bloom refresh task stopped");
                return;
            }
        }

        match bloom.populate_from_users(repos.users()).await {
            Ok(total) => info!(total, "Scheduled bloom refresh complete"),
            Err(e) => warn!("Scheduled bloom refresh failed: {}", e),
        }
    }
}
