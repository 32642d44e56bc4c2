//! # SEI Process Search
//!
//! Automated retrieval of process records from the SEI search portal:
//! every query sits behind an image challenge and paginated
//! server-rendered listings.
//!
//! ## Architecture
//!
//! Four strict layers:
//!
//! ### ① Infrastructure
//! - `infrastructure/` - owns the scarce resources (browser process + page)
//!   and exposes them only as portal capabilities
//! - `ChromeSession` - one Chromium process per job, driven over CDP
//!
//! ### ② Services (capabilities)
//! - `services/` - "what I can do", one job at a time
//! - `TesseractSolver` - challenge image → recognized text
//! - `ResultStore` - durable, checkpointed result collection
//! - `MemoryAdmission` - may a new slice start?
//!
//! ### ③ Workflow
//! - `workflow/` - the complete flow of one job
//! - `ProcessCtx` - which identifier, which job index, which date range
//! - `ProcessFlow` - navigate → fill → solve → extract/paginate, with the
//!   outer retry and the bounded challenge retry
//!
//! ### ④ Orchestration
//! - `orchestrator/batch_scheduler` - slices, admission gate, slice barrier,
//!   aggregation and checkpointing
//! - `orchestrator/app` - wiring and run modes (HTTP endpoint / CSV batch)

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// Re-exports of the common types
pub use browser::launch_headless_browser;
pub use config::{Config, RunMode};
pub use error::{AppError, AppResult};
pub use infrastructure::{
    ChromeSession, ChromeSessionFactory, PortalSession, SessionFactory, SubmitOutcome,
};
pub use models::{DateRange, JobStatus, ProcessJob, ProcessReport, ResultRecord};
pub use orchestrator::{App, BatchScheduler};
pub use services::{
    AdmissionPolicy, AlwaysAdmit, ChallengeSolver, MemoryAdmission, ResultStore, TesseractSolver,
};
pub use workflow::{ProcessCtx, ProcessFlow};
