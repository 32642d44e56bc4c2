//! Application lifecycle - orchestration layer
//!
//! Wires the concrete collaborators from configuration and runs the chosen
//! mode: the HTTP search endpoint, or one CSV-driven batch.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api;
use crate::config::{Config, RunMode};
use crate::infrastructure::ChromeSessionFactory;
use crate::models::{load_identifiers_csv, JobStatus, ProcessReport};
use crate::orchestrator::BatchScheduler;
use crate::services::{
    AdmissionPolicy, AlwaysAdmit, MemoryAdmission, ResultStore, TesseractSolver,
};
use crate::utils::logging;

/// Application entry object
pub struct App {
    config: Config,
    scheduler: Arc<BatchScheduler>,
}

impl App {
    /// Builds every collaborator from configuration
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::init_log_file(&config.output_log_file)?;
        logging::log_startup(&config);

        let store = ResultStore::load(&config.results_file)?;
        if !store.is_empty() {
            info!("📂 retomando com {} resultados persistidos", store.len());
        }

        let factory = Arc::new(ChromeSessionFactory::new(config.clone())?);
        let solver = Arc::new(TesseractSolver::new(&config));
        let admission: Arc<dyn AdmissionPolicy> = if config.admission_enabled {
            Arc::new(MemoryAdmission::new(config.min_free_memory_mb))
        } else {
            info!("⚠️ controle de admissão desativado");
            Arc::new(AlwaysAdmit)
        };

        let scheduler = Arc::new(BatchScheduler::new(
            config.clone(),
            factory,
            solver,
            admission,
            Arc::new(Mutex::new(store)),
        ));

        Ok(Self { config, scheduler })
    }

    /// Runs the configured mode to completion
    pub async fn run(self) -> Result<()> {
        match self.config.run_mode {
            RunMode::Server => {
                api::serve(self.scheduler.clone(), self.config.server_port).await
            }
            RunMode::Csv => self.run_csv_batch().await,
        }
    }

    /// One CSV-driven batch; the sequential variant is just
    /// `MAX_CONCURRENT_JOBS=1` with `ADMISSION_ENABLED=false`
    async fn run_csv_batch(&self) -> Result<()> {
        let identifiers = load_identifiers_csv(&self.config.csv_file)?;
        if identifiers.is_empty() {
            warn!("⚠️ nenhum processo encontrado em {}", self.config.csv_file);
            return Ok(());
        }

        let reports = self.scheduler.run(identifiers, None).await?;
        print_final_stats(&reports, &self.config);
        Ok(())
    }
}

fn print_final_stats(reports: &[ProcessReport], config: &Config) {
    let success = reports
        .iter()
        .filter(|r| r.status == JobStatus::Success)
        .count();
    let no_results = reports
        .iter()
        .filter(|r| r.status == JobStatus::NoResults)
        .count();
    let failed = reports
        .iter()
        .filter(|r| r.status == JobStatus::Error)
        .count();

    info!("\n{}", "=".repeat(60));
    info!("📊 processamento concluído");
    info!(
        "concluído em: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ com resultados: {}/{}", success, reports.len());
    info!("◻️ sem resultados: {}", no_results);
    info!("❌ com erro: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\nresultados salvos em: {}", config.results_file);
}
