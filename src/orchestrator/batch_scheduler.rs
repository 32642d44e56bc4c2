//! Batch scheduler - orchestration layer
//!
//! Runs a job list as bounded concurrent slices. Per slice, in order:
//! admission check (wait and re-check the same slice on denial), concurrent
//! dispatch of one state-machine instance per job, slice barrier, then
//! aggregation into the result sink with a checkpoint after every job.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::SessionFactory;
use crate::models::{DateRange, ProcessReport};
use crate::services::{AdmissionPolicy, ChallengeSolver, ResultStore};
use crate::workflow::{ProcessCtx, ProcessFlow};

/// Slice-level counters
#[derive(Debug, Default)]
struct SliceStats {
    success: usize,
    no_results: usize,
    failed: usize,
}

/// Batch scheduler
///
/// Holds the collaborators shared by every job; the semaphore makes the
/// concurrency bound global even when several batches run at once.
pub struct BatchScheduler {
    config: Config,
    factory: Arc<dyn SessionFactory>,
    solver: Arc<dyn ChallengeSolver>,
    admission: Arc<dyn AdmissionPolicy>,
    store: Arc<Mutex<ResultStore>>,
    semaphore: Arc<Semaphore>,
}

impl BatchScheduler {
    pub fn new(
        config: Config,
        factory: Arc<dyn SessionFactory>,
        solver: Arc<dyn ChallengeSolver>,
        admission: Arc<dyn AdmissionPolicy>,
        store: Arc<Mutex<ResultStore>>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            config,
            factory,
            solver,
            admission,
            store,
            semaphore,
        }
    }

    /// Runs every identifier to a terminal state and returns one report per
    /// submitted identifier, in submission order.
    ///
    /// Identifiers already completed in the store are skipped and answered
    /// from the persisted entry (idempotent resume).
    pub async fn run(
        &self,
        identifiers: Vec<String>,
        date_range: Option<DateRange>,
    ) -> Result<Vec<ProcessReport>> {
        let mut completed: HashMap<String, ProcessReport> = HashMap::new();
        let mut pending: Vec<String> = Vec::new();

        {
            let store = self.store.lock().await;
            for identifier in &identifiers {
                if completed.contains_key(identifier) || pending.contains(identifier) {
                    continue;
                }
                match store.report_for(identifier) {
                    Some(report) if report.status.is_completed() => {
                        info!("⏭️ {} já processado, pulando", identifier);
                        completed.insert(identifier.clone(), report.clone());
                    }
                    _ => pending.push(identifier.clone()),
                }
            }
        }

        let per_slice = self.config.max_concurrent.max(1);
        let total = pending.len();
        if total > 0 {
            log_batch_start(total, per_slice);
        }

        let total_slices = total.div_ceil(per_slice);
        for (slice_index, slice) in pending.chunks(per_slice).enumerate() {
            log_slice_start(slice_index + 1, total_slices, slice.len());

            // Admission gate: the slice index does not advance on denial
            self.wait_for_admission().await;

            let mut handles = Vec::new();
            for (offset, identifier) in slice.iter().enumerate() {
                let job_index = slice_index * per_slice + offset + 1;
                let permit = self.semaphore.clone().acquire_owned().await?;

                let ctx = ProcessCtx::new(identifier.clone(), job_index, date_range.clone());
                let flow = ProcessFlow::new(&self.config, self.solver.clone());
                let factory = self.factory.clone();

                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    flow.run(factory.as_ref(), &ctx).await
                });
                handles.push((identifier.clone(), handle));
            }

            // Slice barrier: every job reaches a terminal state before the
            // next slice is considered
            let mut stats = SliceStats::default();
            for (identifier, handle) in handles {
                let report = match handle.await {
                    Ok(report) => report,
                    Err(e) => {
                        error!("[{}] task panicked: {}", identifier, e);
                        ProcessReport::failed(&identifier, format!("task failed: {}", e))
                    }
                };
                stats.count(&report);

                // Checkpoint after every job; failures here must not kill
                // the batch
                {
                    let mut store = self.store.lock().await;
                    store.record(report.clone());
                    if let Err(e) = store.checkpoint() {
                        error!("checkpoint failed: {}", e);
                    }
                }
                completed.insert(identifier, report);
            }

            log_slice_complete(slice_index + 1, &stats);
        }

        // One report per submitted identifier, in submission order
        let reports = identifiers
            .iter()
            .filter_map(|identifier| completed.get(identifier).cloned())
            .collect();
        Ok(reports)
    }

    /// Blocks until the admission policy allows a new slice, re-checking at
    /// the configured fixed interval.
    async fn wait_for_admission(&self) {
        loop {
            if self.admission.admit() {
                return;
            }
            warn!(
                "⏳ memória insuficiente, aguardando {}s antes de verificar novamente...",
                self.config.admission_poll_secs
            );
            sleep(self.config.admission_poll_interval()).await;
        }
    }
}

impl SliceStats {
    fn count(&mut self, report: &ProcessReport) {
        match report.status {
            crate::models::JobStatus::Success => self.success += 1,
            crate::models::JobStatus::NoResults => self.no_results += 1,
            _ => self.failed += 1,
        }
    }
}

// ========== Log helpers ==========

fn log_batch_start(total: usize, max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("📦 {} processos a executar, {} por fatia", total, max_concurrent);
    info!("💡 cada fatia termina antes da próxima começar");
    info!("{}", "=".repeat(60));
}

fn log_slice_start(slice: usize, total_slices: usize, jobs: usize) {
    info!("\n📄 fatia {}/{}: {} processos", slice, total_slices, jobs);
}

fn log_slice_complete(slice: usize, stats: &SliceStats) {
    info!(
        "✓ fatia {} concluída: {} com resultados, {} sem resultados, {} com erro",
        slice, stats.success, stats.no_results, stats.failed
    );
}
