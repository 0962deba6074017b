use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::charge_service::{ChargeOutcome, ChargeService};
use crate::config::SchedulerConfig;
use crate::core::{Clock, Result, TimezoneConverter};
use crate::store::LoanStore;

/// Tally of one scheduler run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub selected: usize,
    pub initiated: usize,
    pub failed: usize,
    pub escalated: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Daily job that charges due installments through their mandates.
///
/// Runs at the configured IST hour. A run that starts while another is still
/// in progress is skipped.
pub struct RetryScheduler {
    store: Arc<dyn LoanStore>,
    charges: Arc<ChargeService>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    running: Mutex<()>,
}

impl RetryScheduler {
    pub fn new(
        store: Arc<dyn LoanStore>,
        charges: Arc<ChargeService>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            charges,
            clock,
            config,
            running: Mutex::new(()),
        }
    }

    /// Start the daily loop.
    /// This should be spawned as a tokio task in main.rs
    pub async fn start(self: Arc<Self>) {
        info!(
            run_hour = self.config.run_hour,
            max_retries = self.config.max_retries,
            "Starting installment charge scheduler"
        );

        loop {
            let now = self.clock.now();
            let delay = TimezoneConverter::next_business_hour(now, self.config.run_hour)
                .and_then(|next| (next - now).to_std().ok())
                .unwrap_or(Duration::from_secs(3600));
            tokio::time::sleep(delay).await;

            match self.run_once().await {
                Ok(Some(summary)) => info!(
                    selected = summary.selected,
                    initiated = summary.initiated,
                    failed = summary.failed,
                    escalated = summary.escalated,
                    skipped = summary.skipped,
                    errors = summary.errors,
                    "Scheduled charge run finished"
                ),
                Ok(None) => {}
                Err(e) => error!(error = %e, "Scheduled charge run failed"),
            }
        }
    }

    /// Charge every installment due today or earlier.
    ///
    /// Returns `None` when another run holds the run lock. A failure on one
    /// installment is counted and the batch continues.
    pub async fn run_once(&self) -> Result<Option<RunSummary>> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Charge run already in progress; skipping");
            return Ok(None);
        };

        let today = self.clock.today();
        let due = {
            let mut tx = self.store.begin().await?;
            let due = tx
                .find_due_installments(today, self.config.max_retries)
                .await?;
            drop(tx);
            due
        };

        info!(date = %today, due = due.len(), "Charge run started");

        let mut summary = RunSummary {
            selected: due.len(),
            ..RunSummary::default()
        };

        for installment in due {
            match self.charges.charge_due(&installment.id).await {
                Ok(ChargeOutcome::Initiated { .. }) => summary.initiated += 1,
                Ok(ChargeOutcome::Failed { escalated, .. }) => {
                    summary.failed += 1;
                    if escalated {
                        summary.escalated += 1;
                    }
                }
                Ok(ChargeOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    summary.errors += 1;
                    error!(
                        installment_id = %installment.id,
                        error = %e,
                        "Installment charge errored"
                    );
                }
            }
        }

        Ok(Some(summary))
    }
}
