//! Auto-compounding lending loop.
//!
//! While running, every interval the loop re-offers each coin's full
//! lendable amount (which includes interest already paid out), so earned
//! interest is lent again. `start`/`stop` are fire-and-forget.

use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{LendingControl, LendingVenue};

/// Outcome of one compounding round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundReport {
    pub offered: Vec<String>,
    pub failed: Vec<String>,
}

pub struct LendingLoop {
    venue: Arc<dyn LendingVenue>,
    interval: Duration,
    min_rate: f64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LendingLoop {
    pub fn new(venue: Arc<dyn LendingVenue>, interval: Duration, min_rate: f64) -> Self {
        Self {
            venue,
            interval,
            min_rate,
            task: Mutex::new(None),
        }
    }

    /// Run a single compounding round.
    pub async fn compound_once(&self) -> Result<CompoundReport> {
        compound(&*self.venue, self.min_rate).await
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn compound(venue: &dyn LendingVenue, min_rate: f64) -> Result<CompoundReport> {
    let positions = venue.fetch_lending_info().await?;
    let mut report = CompoundReport::default();

    for position in positions.iter().filter(|p| p.lendable > 0.0) {
        let rate = position.min_rate.unwrap_or(min_rate).max(min_rate);
        match venue
            .submit_lending_offer(&position.coin, position.lendable, rate)
            .await
        {
            Ok(()) => {
                debug!(coin = %position.coin, size = position.lendable, rate, "Lending offer placed");
                report.offered.push(position.coin.clone());
            }
            Err(e) => {
                warn!(coin = %position.coin, error = %e, "Lending offer failed");
                report.failed.push(position.coin.clone());
            }
        }
    }

    info!(
        offered = report.offered.len(),
        failed = report.failed.len(),
        "Compounding round complete"
    );
    Ok(report)
}

impl LendingControl for LendingLoop {
    fn start(&self) {
        let mut task = self.task();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            info!("Lending loop already running");
            return;
        }

        let venue = Arc::clone(&self.venue);
        let period = self.interval;
        let min_rate = self.min_rate;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = compound(&*venue, min_rate).await {
                    error!(error = %e, "Compounding round failed, will retry next interval");
                }
            }
        }));
        info!(interval_secs = period.as_secs(), "Lending loop started");
    }

    fn stop(&self) {
        match self.task().take() {
            Some(handle) => {
                handle.abort();
                info!("Lending loop stopped");
            }
            None => debug!("Lending loop was not running"),
        }
    }

    fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|t| !t.is_finished())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
