//! Confirmation reconciler.
//!
//! Periodically walks pending records and moves each one forward:
//!
//! - `pending → confirmed` when a provider reports the transaction mined at
//!   height `H`, with `confirmations = current_height − H + 1`
//! - `pending → failed` when no provider answered successfully (an error or
//!   `NotFound`) and the record is older than the staleness threshold
//!
//! A mempool sighting keeps the record pending. Terminal records are never
//! touched. A failed chain-height query skips the whole pass.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zinc_core::traits::{TransactionStore, TxLookup};
use zinc_core::types::{TransactionRecord, TxStatus};
use zinc_providers::ChainSource;

use crate::config::ReconcileConfig;
use crate::unix_now;

/// Outcome counts for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub confirmed: usize,
    pub failed: usize,
    pub still_pending: usize,
    /// Lookup or storage errors encountered; the pass continued past each.
    pub errors: usize,
    /// The chain height could not be obtained, so nothing was examined.
    pub skipped: bool,
}

impl ReconcileReport {
    pub fn examined(&self) -> usize {
        self.confirmed + self.failed + self.still_pending
    }
}

pub struct ConfirmationReconciler {
    store: Arc<dyn TransactionStore>,
    chain: ChainSource,
    config: ReconcileConfig,
}

impl ConfirmationReconciler {
    pub fn new(store: Arc<dyn TransactionStore>, chain: ChainSource, config: ReconcileConfig) -> Self {
        Self {
            store,
            chain,
            config,
        }
    }

    /// One pass over pending records older than the grace period, as of `now`
    /// (unix seconds).
    pub async fn run_once(&self, now: u64) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let current_height = match self.chain.chain_height().await {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "chain height unavailable, skipping reconcile pass");
                report.skipped = true;
                return report;
            }
        };

        let cutoff = now.saturating_sub(self.config.grace.as_secs());
        let pending = match self.store.find_pending_older_than(cutoff) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "failed to load pending records");
                report.errors += 1;
                return report;
            }
        };

        for record in pending {
            self.reconcile_record(&record, current_height, now, &mut report)
                .await;
        }

        if report.examined() > 0 || report.errors > 0 {
            info!(
                height = current_height,
                confirmed = report.confirmed,
                failed = report.failed,
                pending = report.still_pending,
                errors = report.errors,
                "reconcile pass complete"
            );
        }
        report
    }

    async fn reconcile_record(
        &self,
        record: &TransactionRecord,
        current_height: u64,
        now: u64,
        report: &mut ReconcileReport,
    ) {
        if record.status.is_terminal() {
            return;
        }

        let answered = match self.chain.lookup(&record.txid).await {
            Ok(TxLookup::Mined { height }) => {
                let confirmations = current_height.saturating_sub(height) + 1;
                match self.store.update_status(
                    record.id,
                    TxStatus::Confirmed,
                    Some(height),
                    Some(confirmations),
                    now,
                ) {
                    Ok(_) => {
                        info!(txid = %record.txid, height, confirmations, "transaction confirmed");
                        report.confirmed += 1;
                    }
                    Err(e) => {
                        warn!(txid = %record.txid, error = %e, "failed to mark confirmed");
                        report.errors += 1;
                    }
                }
                return;
            }
            Ok(TxLookup::Mempool) => true,
            Ok(TxLookup::NotFound) => false,
            Err(e) => {
                debug!(txid = %record.txid, error = %e, "lookup failed");
                report.errors += 1;
                false
            }
        };

        let stale = record.age_secs(now) > self.config.stale_after.as_secs();
        if answered || !stale {
            report.still_pending += 1;
            return;
        }

        match self
            .store
            .update_status(record.id, TxStatus::Failed, None, None, now)
        {
            Ok(_) => {
                warn!(txid = %record.txid, age_secs = record.age_secs(now), "transaction marked failed");
                report.failed += 1;
            }
            Err(e) => {
                warn!(txid = %record.txid, error = %e, "failed to mark failed");
                report.errors += 1;
            }
        }
    }

    /// Run passes every `interval` until `shutdown` flips to `true` or its
    /// sender is dropped. The first pass runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once(unix_now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("reconciler stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the runtime, returning its handle and the
    /// shutdown trigger.
    pub fn spawn(self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (tokio::spawn(self.run(rx)), tx)
    }
}
