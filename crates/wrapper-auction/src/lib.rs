pub mod adapter;
pub mod domain;
pub mod infra;
pub mod orchestrator;
mod run;
pub mod store;

pub use {
    adapter::{Adapter, Registry},
    orchestrator::{AdapterState, Options, Orchestrator},
    run::{Report, run, start},
    store::ResultStore,
};
