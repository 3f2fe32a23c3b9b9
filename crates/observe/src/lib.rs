//! Logging and metrics setup shared by the binaries and tests of the
//! workspace.
pub mod config;
pub mod metrics;
pub mod tracing;

pub use config::{Config, Format};
