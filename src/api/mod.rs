//! HTTP request surface
//!
//! One endpoint: `POST /buscar`, accepting a single process identifier or a
//! non-empty list and answering with the terminal record(s).

pub mod server;

pub use server::{router, serve, ApiState};
