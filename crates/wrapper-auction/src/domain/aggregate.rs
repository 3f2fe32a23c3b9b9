use {
    super::{AuctionResult, BidResult, Targeting},
    indexmap::IndexMap,
    serde::Serialize,
};

/// The outcome of a slot's auction across all adapters that took part in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedSlotResult {
    /// Results keyed by adapter name, in adapter registration order.
    pub adapters: IndexMap<String, AuctionResult>,
    /// Targeting merged from every bid of every successful adapter.
    pub targeting: Targeting,
}

impl AggregatedSlotResult {
    /// Merges the results of all adapters of a slot.
    ///
    /// `results` has to be in adapter registration order. Targeting keys are
    /// folded in that order so a key set by a later adapter replaces the value
    /// of an earlier one.
    pub fn merge(results: impl IntoIterator<Item = (String, AuctionResult)>) -> Self {
        let adapters: IndexMap<_, _> = results.into_iter().collect();
        let mut targeting = Targeting::new();
        for bid in adapters.values().flat_map(AuctionResult::winning_bids) {
            targeting.extend(
                bid.targeting
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
        }
        Self {
            adapters,
            targeting,
        }
    }

    /// Names of the adapters that placed at least one bid.
    pub fn bidders(&self) -> impl Iterator<Item = &str> {
        self.adapters
            .iter()
            .filter(|(_, result)| result.has_bids())
            .map(|(name, _)| name.as_str())
    }

    /// The bid with the highest CPM, the earliest one on ties.
    pub fn best_bid(&self) -> Option<&BidResult> {
        self.adapters
            .values()
            .flat_map(AuctionResult::winning_bids)
            .reduce(|best, bid| {
                if bid.cpm.unwrap_or(0.) > best.cpm.unwrap_or(0.) {
                    bid
                } else {
                    best
                }
            })
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
