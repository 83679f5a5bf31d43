//! Coordinated stop for long-running work
//!
//! One watch-channel flag fans the stop request out to the HTTP server,
//! the SMS worker loops, and the background refresh tasks. The first OS
//! signal starts the drain; a second one aborts the process instead of
//! waiting out the grace period. Stop requests are counted so operators
//! can tell a clean restart from a kill loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

/// Observer handle for the stop flag. Cheap to clone; one per task.
#[derive(Clone)]
pub struct Shutdown {
    stop: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_stopping(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolve once a stop has been requested. Returns immediately when
    /// the flag is already set.
    pub async fn wait(&self) {
        let mut stop = self.stop.clone();
        let _ = stop.wait_for(|stopping| *stopping).await;
    }
}

/// Owner of the stop flag and the drain grace period.
pub struct ShutdownController {
    stop: Arc<watch::Sender<bool>>,
    grace: Duration,
}

impl ShutdownController {
    pub fn new(grace_secs: u64) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            stop: Arc::new(stop),
            grace: Duration::from_secs(grace_secs),
        }
    }

    pub fn handle(&self) -> Shutdown {
        Shutdown {
            stop: self.stop.subscribe(),
        }
    }

    /// Flip the stop flag. Idempotent; repeat requests are no-ops.
    pub fn request_stop(&self) {
        if !self.stop.send_replace(true) {
            metrics::counter!("shutdown_requests_total").increment(1);
            info!("Stop requested; draining in-flight work");
        }
    }

    /// Watch for SIGTERM/SIGINT. The first signal starts the drain; a
    /// second aborts without draining.
    pub fn spawn_signal_watcher(&self) {
        let stop = Arc::clone(&self.stop);
        tokio::spawn(async move {
            wait_for_termination_signal().await;
            if !stop.send_replace(true) {
                metrics::counter!("shutdown_requests_total").increment(1);
                info!("Termination signal received; draining in-flight work");
            }

            wait_for_termination_signal().await;
            warn!("Second termination signal; aborting without drain");
            std::process::exit(1);
        });
    }

    /// Once a stop is requested, run `drain` bounded by the grace period.
    /// Returns whether the drain finished in time.
    pub async fn drain_within_grace<F>(&self, drain: F) -> bool
    where
        F: Future<Output = ()>,
    {
        self.handle().wait().await;

        match tokio::time::timeout(self.grace, drain).await {
            Ok(()) => {
                info!("Drain finished inside the grace period");
                true
            }
            Err(_) => {
                warn!(
                    grace_secs = self.grace.as_secs(),
                    "Drain exceeded the grace period"
                );
                false
            }
        }
    }
}

async fn wait_for_termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Ctrl+C handler");
    }
}
