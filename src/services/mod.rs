pub mod admission;
pub mod captcha;
pub mod store;

pub use admission::{AdmissionPolicy, AlwaysAdmit, MemoryAdmission};
pub use captcha::{ChallengeSolver, TesseractSolver};
pub use store::ResultStore;
