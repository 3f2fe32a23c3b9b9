use {
    crate::{
        adapter::http,
        domain::{SlotId, Size},
    },
    std::{collections::HashMap, path::PathBuf, time::Duration},
};

pub mod file;

pub use file::{load, parse};

/// Configuration of the process after parsing and validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default timeout of an auction.
    pub timeout: Duration,
    /// Bound on the initialization of a single adapter.
    pub init_timeout: Duration,
    /// Enabled adapters in the order they are registered.
    pub adapters: Vec<http::Config>,
    pub slots: HashMap<SlotId, SlotConfig>,
}

/// Page level defaults of a slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotConfig {
    pub sizes: Vec<Size>,
    /// Name of the slot in the ad server.
    pub ad_server_slot: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error while reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML syntax error")]
    Syntax(#[from] toml::de::Error),
    #[error("{0} must not be zero")]
    ZeroTimeout(&'static str),
}
