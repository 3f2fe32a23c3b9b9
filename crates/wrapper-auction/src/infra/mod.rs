pub mod cli;
pub mod config;
pub mod observe;

pub use config::Config;
