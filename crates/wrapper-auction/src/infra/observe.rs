//! Observability of the orchestrator. Every function represents an event that
//! is meaningful to the auction. It logs the event and updates the metrics if
//! the event is worth measuring.

use {
    crate::domain::{AggregatedSlotResult, AuctionResult, SlotId},
    std::time::Duration,
};

/// Setup the observability. The config determines the format and the filter
/// of the logs.
pub fn init(config: &observe::Config) {
    observe::tracing::initialize(config);
    observe::metrics::setup_registry("wrapper_auction");
}

/// Observe the metrics collected during the run.
pub fn metrics_snapshot() {
    let metrics = observe::metrics::encode(observe::metrics::get_registry());
    tracing::debug!("collected metrics:\n{metrics}");
}

/// Observe that an auction for a batch of slots started.
pub fn auction_started(slots: &[SlotId], timeout: Duration) {
    tracing::info!(?slots, ?timeout, "starting auction");
}

/// Observe the adapters taking part in the auction of a slot.
pub fn candidates(slot: &SlotId, adapters: &[&str]) {
    tracing::debug!(%slot, ?adapters, "adapters taking part");
}

/// Observe that an adapter panicked in one of its synchronous operations.
pub fn adapter_panicked(adapter: &str, operation: &str, message: &str) {
    tracing::error!(adapter, operation, message, "adapter panicked");
}

/// Observe that an adapter could not be initialized and sits out the auction.
pub fn init_failed(adapter: &str, reason: &str) {
    tracing::warn!(adapter, reason, "adapter initialization failed");
    metrics()
        .init_failures
        .with_label_values(&[adapter])
        .inc();
}

/// Observe the result an adapter settled with.
pub fn settled(adapter: &str, slot: &SlotId, result: &AuctionResult, elapsed: Duration) {
    let bids = result.winning_bids().count();
    let label = match (result.success, bids) {
        (true, 0) => "no_bid",
        (true, _) => "success",
        (false, _) => "failure",
    };
    if result.success {
        tracing::debug!(adapter, %slot, bids, ?elapsed, "adapter settled");
    } else {
        tracing::info!(adapter, %slot, reason = ?result.reason, ?elapsed, "adapter failed");
    }
    let metrics = metrics();
    metrics
        .requests
        .with_label_values(&[adapter, label])
        .observe(elapsed.as_secs_f64());
    metrics
        .bids
        .with_label_values(&[adapter])
        .inc_by(bids as u64);
}

/// Observe that an adapter did not settle within the timeout.
pub fn timed_out(adapter: &str, slot: &SlotId, timeout: Duration) {
    tracing::info!(adapter, %slot, ?timeout, "adapter timed out");
    metrics()
        .requests
        .with_label_values(&[adapter, "timeout"])
        .observe(timeout.as_secs_f64());
}

/// Observe that an adapter panicked while requesting bids.
pub fn request_panicked(adapter: &str, slot: &SlotId, message: &str, elapsed: Duration) {
    tracing::error!(adapter, %slot, message, "adapter panicked while requesting bids");
    metrics()
        .requests
        .with_label_values(&[adapter, "panic"])
        .observe(elapsed.as_secs_f64());
}

/// Observe that an adapter reported a bid on behalf of another bidder.
pub fn foreign_bid(adapter: &str, slot: &SlotId, bidder: Option<&str>) {
    tracing::warn!(adapter, %slot, ?bidder, "discarded bid of foreign bidder");
}

/// Observe the merged result of a slot.
pub fn merged(slot: &SlotId, result: &AggregatedSlotResult, elapsed: Duration) {
    tracing::info!(
        %slot,
        adapters = result.adapters.len(),
        bidders = ?result.bidders().collect::<Vec<_>>(),
        targeting = ?result.targeting,
        ?elapsed,
        "slot auction finished"
    );
    metrics()
        .slot_auction_time
        .observe(elapsed.as_secs_f64());
}

/// Observe that an adapter pushed its targeting for a slot.
pub fn targeting_applied(adapter: &str, slot: &SlotId) {
    tracing::trace!(adapter, %slot, "applied targeting");
}

/// Observe that a slot was removed from the page.
pub fn slot_cleared(slot: &SlotId, had_result: bool) {
    tracing::debug!(%slot, had_result, "cleared slot");
}

/// Observe the end of an auction.
pub fn auction_finished(slots: usize, elapsed: Duration) {
    tracing::info!(slots, ?elapsed, "auction finished");
}

#[derive(prometheus_metric_storage::MetricStorage)]
#[metric(subsystem = "orchestrator")]
struct Metrics {
    /// Duration of adapter bid requests by outcome.
    #[metric(
        labels("adapter", "result"),
        buckets(0.01, 0.05, 0.1, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0)
    )]
    requests: prometheus::HistogramVec,

    /// Adapter initializations that failed.
    #[metric(labels("adapter"))]
    init_failures: prometheus::IntCounterVec,

    /// Bids received per adapter.
    #[metric(labels("adapter"))]
    bids: prometheus::IntCounterVec,

    /// Time spent on the complete auction of a slot.
    #[metric(buckets(0.01, 0.05, 0.1, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0))]
    slot_auction_time: prometheus::Histogram,
}

fn metrics() -> &'static Metrics {
    Metrics::instance(observe::metrics::get_storage_registry())
        .expect("unexpected error getting metrics instance")
}
