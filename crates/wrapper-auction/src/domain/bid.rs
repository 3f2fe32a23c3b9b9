use {
    super::SlotId,
    serde::{Deserialize, Serialize},
    std::{collections::BTreeMap, time::Duration},
};

/// Reason of a result synthesized for an adapter that did not settle in time.
pub const TIMEOUT: &str = "timeout";

/// Reason of a failure the adapter did not explain.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Key/value pairs handed to the ad server to influence creative selection.
pub type Targeting = BTreeMap<String, TargetingValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetingValue {
    Single(String),
    Multiple(Vec<String>),
}

impl From<&str> for TargetingValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_owned())
    }
}

impl From<String> for TargetingValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for TargetingValue {
    fn from(value: Vec<String>) -> Self {
        Self::Multiple(value)
    }
}

/// The outcome of one adapter bidding on one slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResult {
    pub slot: SlotId,
    pub has_bid: bool,
    /// Cost per thousand impressions. Absent (or zero) without a bid.
    pub cpm: Option<f64>,
    /// Name of the adapter that produced the bid.
    pub bidder: Option<String>,
    #[serde(with = "humantime_serde")]
    pub latency: Option<Duration>,
    /// Targeting the bid contributes to the slot if it takes part in the
    /// merge.
    pub targeting: Targeting,
    /// Adapter specific data the orchestrator never looks at.
    pub payload: Option<serde_json::Value>,
}

impl BidResult {
    pub fn bid(slot: SlotId, bidder: &str, cpm: f64) -> Self {
        Self {
            slot,
            has_bid: true,
            cpm: Some(cpm),
            bidder: Some(bidder.to_owned()),
            latency: None,
            targeting: Default::default(),
            payload: None,
        }
    }

    pub fn no_bid(slot: SlotId, bidder: &str) -> Self {
        Self {
            slot,
            has_bid: false,
            cpm: None,
            bidder: Some(bidder.to_owned()),
            latency: None,
            targeting: Default::default(),
            payload: None,
        }
    }

    pub fn with_targeting(mut self, key: &str, value: impl Into<TargetingValue>) -> Self {
        self.targeting.insert(key.to_owned(), value.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// What a single adapter reported for a single slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionResult {
    pub success: bool,
    /// Why the adapter failed. Always set if `success` is false.
    pub reason: Option<String>,
    /// Bids in the order the adapter reported them.
    pub bids: Vec<BidResult>,
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
}

impl AuctionResult {
    pub fn success(bids: Vec<BidResult>) -> Self {
        Self {
            success: true,
            reason: None,
            bids,
            duration: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            success: false,
            reason: Some(if reason.is_empty() {
                UNKNOWN_ERROR.to_owned()
            } else {
                reason
            }),
            bids: Vec::new(),
            duration: None,
        }
    }

    pub fn timeout() -> Self {
        Self::failure(TIMEOUT)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn is_timeout(&self) -> bool {
        !self.success && self.reason.as_deref() == Some(TIMEOUT)
    }

    /// Bids that actually carry a bid. Failed results never have any.
    pub fn winning_bids(&self) -> impl Iterator<Item = &BidResult> {
        let bids = if self.success { self.bids.as_slice() } else { &[] };
        bids.iter().filter(|bid| bid.has_bid)
    }

    pub fn has_bids(&self) -> bool {
        self.winning_bids().next().is_some()
    }
}
