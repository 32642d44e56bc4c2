pub mod job;
pub mod loaders;

pub use job::{DateRange, JobStatus, ProcessJob, ProcessReport, ResultRecord};
pub use loaders::load_identifiers_csv;
