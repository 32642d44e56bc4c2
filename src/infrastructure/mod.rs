//! Infrastructure layer
//!
//! Holds the scarce resources (browser process + page) and exposes them
//! only through the portal capability traits. Nothing here knows about
//! retry policy or batch scheduling.

pub mod chrome;
pub mod portal;

pub use chrome::{ChromeSession, ChromeSessionFactory};
pub use portal::{PortalSession, SessionFactory, SubmitOutcome};
