use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::findings::{Finding, FindingsSink};
use crate::probe::{ProbeOutcome, Prober};
use crate::report::Reporter;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_COOLDOWN_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub cooldown: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_RETRIES,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
        }
    }
}

/// A subdomain and its position in the input list. Duplicates get distinct slots.
pub type Slot = (usize, String);

#[derive(Debug)]
struct LedgerEntry {
    subdomain: String,
    attempts: u32,
    failed_round: u32,
}

/// Transport-level failure counts per input slot. Only the round coordinator mutates it.
#[derive(Debug, Default)]
pub struct FailureLedger {
    entries: HashMap<usize, LedgerEntry>,
    // names that produced a conclusive outcome in some slot
    resolved: HashSet<String>,
}

impl FailureLedger {
    pub fn record_failure(&mut self, slot: usize, subdomain: &str, round: u32) -> u32 {
        let entry = self.entries.entry(slot).or_insert_with(|| LedgerEntry {
            subdomain: subdomain.to_string(),
            attempts: 0,
            failed_round: round,
        });
        entry.attempts += 1;
        entry.failed_round = round;
        entry.attempts
    }

    /// A Clean or Vulnerable result settles the name for every slot carrying it.
    pub fn resolve(&mut self, slot: usize, subdomain: &str) {
        self.entries.remove(&slot);
        self.resolved.insert(subdomain.to_string());
    }

    /// Slots that failed in `round` and still have budget: one first attempt plus `max_retries` retries.
    pub fn eligible(&self, round: u32, max_retries: u32) -> Vec<Slot> {
        let mut pending: Vec<Slot> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.failed_round == round
                    && entry.attempts <= max_retries
                    && !self.resolved.contains(&entry.subdomain)
            })
            .map(|(slot, entry)| (*slot, entry.subdomain.clone()))
            .collect();
        pending.sort();
        pending
    }

    /// Unresolved slots in input order, with their attempt counts.
    pub fn into_failed(self) -> Vec<(String, u32)> {
        let resolved = self.resolved;
        let mut failed: Vec<(usize, LedgerEntry)> = self
            .entries
            .into_iter()
            .filter(|(_, entry)| !resolved.contains(&entry.subdomain))
            .collect();
        failed.sort_by_key(|(slot, _)| *slot);
        failed
            .into_iter()
            .map(|(_, entry)| (entry.subdomain, entry.attempts))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub targets: usize,
    pub rounds: u32,
    pub probes: usize,
    pub clean: usize,
    pub vulnerable: usize,
    /// Subdomains never checked because every attempt failed, with their attempt counts.
    pub failed: Vec<(String, u32)>,
}

enum Dispatch {
    Completed(ProbeOutcome),
    // the probe task itself died
    Fault(String),
}

#[derive(Default)]
struct ScanTally {
    probes: usize,
    clean: usize,
    vulnerable: usize,
}

pub struct Scheduler {
    prober: Arc<Prober>,
    sink: Arc<dyn FindingsSink>,
    reporter: Reporter,
    settings: ScanSettings,
    permits: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(
        prober: Arc<Prober>,
        sink: Arc<dyn FindingsSink>,
        reporter: Reporter,
        settings: ScanSettings,
    ) -> Self {
        let settings = ScanSettings {
            max_concurrency: settings.max_concurrency.max(1),
            ..settings
        };
        Self {
            prober,
            sink,
            reporter,
            permits: Arc::new(Semaphore::new(settings.max_concurrency)),
            settings,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub async fn run(&self, subdomains: Vec<String>) -> ScanSummary {
        let scan_id = Uuid::new_v4();
        let targets = subdomains.len();
        let max_retries = self.settings.max_retries;
        info!(%scan_id, targets, max_retries, "scan started");

        let mut ledger = FailureLedger::default();
        let mut tally = ScanTally::default();
        let mut pending: Vec<Slot> = subdomains.into_iter().enumerate().collect();
        let mut round: u32 = 0;

        loop {
            self.run_round(round, pending, &mut ledger, &mut tally).await;
            let finished = round;
            round += 1;
            if round > max_retries {
                break;
            }
            pending = ledger.eligible(finished, max_retries);
            if pending.is_empty() {
                break;
            }
            self.reporter.retrying(round, max_retries, pending.len());
            info!(round, pending = pending.len(), cooldown = ?self.settings.cooldown, "retrying failed subdomains");
            tokio::time::sleep(self.settings.cooldown).await;
        }

        let failed = ledger.into_failed();
        info!(%scan_id, rounds = round, failed = failed.len(), "scan finished");
        ScanSummary {
            scan_id,
            targets,
            rounds: round,
            probes: tally.probes,
            clean: tally.clean,
            vulnerable: tally.vulnerable,
            failed,
        }
    }

    /// Probes every pending subdomain and returns once all of them have reported back.
    async fn run_round(
        &self,
        round: u32,
        pending: Vec<Slot>,
        ledger: &mut FailureLedger,
        tally: &mut ScanTally,
    ) {
        let bar = self.reporter.round_bar(pending.len());
        let (tx, mut rx) = mpsc::unbounded_channel::<(Slot, Dispatch)>();

        let dispatch = async move {
            for (slot, subdomain) in pending {
                let permit = match Arc::clone(&self.permits).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        error!(round, "probe pool closed, abandoning round");
                        break;
                    }
                };
                let prober = Arc::clone(&self.prober);
                let tx = tx.clone();

                tokio::spawn(async move {
                    let target = subdomain.clone();
                    let probe = tokio::spawn(async move { prober.probe(&target).await });
                    let result = match probe.await {
                        Ok(outcome) => Dispatch::Completed(outcome),
                        Err(err) => Dispatch::Fault(err.to_string()),
                    };
                    drop(permit);
                    let _ = tx.send(((slot, subdomain), result));
                });
            }
        };

        let collect = async {
            while let Some(((slot, subdomain), result)) = rx.recv().await {
                tally.probes += 1;
                match result {
                    Dispatch::Completed(outcome) => {
                        self.reporter.outcome(&bar, &subdomain, &outcome);
                        self.settle(&bar, round, slot, &subdomain, outcome, ledger, tally)
                            .await;
                    }
                    Dispatch::Fault(reason) => {
                        let attempts = ledger.record_failure(slot, &subdomain, round);
                        warn!(%subdomain, attempts, %reason, "probe faulted");
                        self.reporter.fault(&bar, &subdomain, &reason);
                    }
                }
                bar.inc(1);
            }
        };

        tokio::join!(dispatch, collect);
        bar.finish_and_clear();
    }

    #[allow(clippy::too_many_arguments)]
    async fn settle(
        &self,
        bar: &indicatif::ProgressBar,
        round: u32,
        slot: usize,
        subdomain: &str,
        outcome: ProbeOutcome,
        ledger: &mut FailureLedger,
        tally: &mut ScanTally,
    ) {
        match outcome {
            ProbeOutcome::Vulnerable {
                url,
                status_code,
                body_snippet,
            } => {
                ledger.resolve(slot, subdomain);
                tally.vulnerable += 1;
                let finding = Finding::new(subdomain, &url, status_code, &body_snippet);
                match self.sink.record(&finding).await {
                    Ok(()) => self.reporter.recorded(bar, &finding),
                    Err(err) => error!(%subdomain, %url, error = %err, "finding not persisted"),
                }
            }
            ProbeOutcome::Clean => {
                ledger.resolve(slot, subdomain);
                tally.clean += 1;
            }
            ProbeOutcome::TransportError { reason } => {
                let attempts = ledger.record_failure(slot, subdomain, round);
                info!(%subdomain, attempts, %reason, "unreachable");
            }
        }
    }
}
