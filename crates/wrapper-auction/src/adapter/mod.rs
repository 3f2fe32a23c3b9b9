//! The contract every demand source implements, and the registry holding the
//! adapters of the process.

use {
    crate::domain::{AuctionContext, AuctionResult, SlotId, Size},
    serde::{Deserialize, Serialize},
    std::time::Duration,
};

pub mod http;
pub mod mocks;
pub mod registry;

pub use registry::{DuplicateAdapter, Registry};

/// Margin an adapter may take on top of the auction timeout before its
/// `request_bids` resolves.
pub const GRACE: Duration = Duration::from_millis(50);

/// Vendor specific configuration of a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdUnit {
    pub code: String,
    #[serde(default)]
    pub sizes: Vec<Size>,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Optional operations an adapter supports. The orchestrator only calls
/// [`Adapter::clear_slot`] and [`Adapter::state`] on adapters announcing them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub clear_slot: bool,
    pub state: bool,
}

/// Failures inside an adapter. They never cross the contract boundary as
/// errors but end up as the reason of a failed [`AuctionResult`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} not loaded")]
    LibraryNotLoaded(String),
    #[error("no adUnit config")]
    ConfigMissing,
    #[error("init failed: {0:#}")]
    Init(anyhow::Error),
    #[error("{0:#}")]
    Vendor(anyhow::Error),
}

impl From<Error> for AuctionResult {
    fn from(err: Error) -> Self {
        AuctionResult::failure(err.to_string())
    }
}

/// A pluggable integration of one third-party bidding source.
///
/// Only [`Adapter::init`] and [`Adapter::request_bids`] may suspend. Every
/// other operation is expected to be cheap and side effect free, except for
/// [`Adapter::apply_targeting`] and [`Adapter::clear_slot`].
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Unique name of the adapter. Bids it produces carry this name as their
    /// bidder.
    fn name(&self) -> &str;

    /// Whether the vendor library backing the adapter is available.
    fn is_library_loaded(&self) -> bool;

    /// Prepares the vendor library. Calling it again after it succeeded must
    /// not repeat the setup. Implementations bound their own waiting time.
    async fn init(&self, context: &AuctionContext) -> Result<(), Error>;

    /// Whether the adapter takes part in the auction of the slot. Never
    /// performs I/O.
    fn has_slot_config(&self, slot: &SlotId, context: &AuctionContext) -> bool;

    /// The vendor configuration for the slot, `None` exactly when
    /// [`Adapter::has_slot_config`] is false.
    fn get_ad_unit(&self, slot: &SlotId, context: &AuctionContext) -> Option<AdUnit>;

    /// Requests bids for the slot. Resolves within `timeout` plus [`GRACE`]
    /// and reports every failure as an unsuccessful result instead of
    /// panicking.
    async fn request_bids(
        &self,
        slot: &SlotId,
        context: &AuctionContext,
        timeout: Duration,
    ) -> AuctionResult;

    /// Pushes previously fetched bids of the slot to the ad server slot
    /// referenced by the context. Does nothing without a bid.
    fn apply_targeting(&self, slot: &SlotId, context: &AuctionContext);

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Releases all state held for the slot.
    fn clear_slot(&self, _slot: &SlotId) {}

    /// Debug snapshot of the adapter.
    fn state(&self) -> serde_json::Map<String, serde_json::Value> {
        Default::default()
    }
}
