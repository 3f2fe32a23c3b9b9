//! Runs the auction of a batch of slots across all applicable adapters.
//!
//! Every (slot, adapter) pair goes through `requested -> settled | timed out`
//! and is merged once every pair of the slot reached one of the terminal
//! states. All pairs of all slots are awaited concurrently on the calling
//! task, so the wall time of an auction is bounded by the init timeout plus
//! the auction timeout no matter how many slots and adapters take part.

use {
    crate::{
        adapter::{self, Registry, registry::Registered},
        domain::{
            AggregatedSlotResult,
            AuctionContext,
            AuctionResult,
            ContextBuilder,
            SlotId,
            bid,
        },
        infra::observe,
        store::ResultStore,
    },
    futures::{
        FutureExt,
        future::{BoxFuture, Shared},
    },
    indexmap::IndexSet,
    serde::Serialize,
    std::{
        any::Any,
        collections::{HashMap, HashSet},
        panic::AssertUnwindSafe,
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::Duration,
    },
    tokio::time::Instant,
    tracing::Instrument,
};

/// Outcome of initializing an adapter, awaited by every slot of an auction
/// the adapter takes part in.
type InitAttempt<'a> = Shared<BoxFuture<'a, Result<(), String>>>;

/// How an auction is run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Hard ceiling for every `request_bids` call.
    pub timeout: Duration,
    /// Ceiling for the initialization of a single adapter.
    pub init_timeout: Duration,
    /// Restricts the auction to these adapters if set.
    pub include_adapters: Option<HashSet<String>>,
}

impl Options {
    pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            init_timeout: Self::DEFAULT_INIT_TIMEOUT,
            include_adapters: None,
        }
    }

    pub fn with_init_timeout(mut self, init_timeout: Duration) -> Self {
        self.init_timeout = init_timeout;
        self
    }

    pub fn with_included_adapters<S: Into<String>>(
        mut self,
        adapters: impl IntoIterator<Item = S>,
    ) -> Self {
        self.include_adapters = Some(adapters.into_iter().map(Into::into).collect());
        self
    }

    fn includes(&self, adapter: &str) -> bool {
        self.include_adapters
            .as_ref()
            .is_none_or(|included| included.contains(adapter))
    }
}

/// Debug snapshot of a registered adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterState {
    pub name: String,
    pub library_loaded: bool,
    pub initialized: bool,
    pub state: Option<serde_json::Map<String, serde_json::Value>>,
}

pub struct Orchestrator {
    registry: Arc<Registry>,
    store: ResultStore,
    next_auction: AtomicU64,
}

impl Orchestrator {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            store: ResultStore::default(),
            next_auction: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Read access to the latest result of every slot.
    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Runs the auction of every given slot and returns once each of them has
    /// a result. Adapter failures of any kind end up in the results and never
    /// abort the auction.
    pub async fn run_auction(
        &self,
        slots: impl IntoIterator<Item = SlotId>,
        contexts: &dyn ContextBuilder,
        options: &Options,
    ) -> HashMap<SlotId, AggregatedSlotResult> {
        let slots = slots
            .into_iter()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let slot_contexts = slots
            .iter()
            .map(|slot| contexts.build(slot))
            .collect::<Vec<_>>();
        let id = self.next_auction.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        async {
            observe::auction_started(&slots, options.timeout);
            let candidates = slots
                .iter()
                .zip(&slot_contexts)
                .map(|(slot, context)| self.candidates(slot, context, options))
                .collect::<Vec<_>>();

            // At most one init attempt per adapter and auction, shared by all
            // slots waiting for it. It uses the context of the first slot the
            // adapter takes part in.
            let entries = self.registry.entries();
            let mut inits: Vec<Option<InitAttempt>> = entries.iter().map(|_| None).collect();
            for (indices, context) in candidates.iter().zip(&slot_contexts) {
                for &index in indices {
                    inits[index].get_or_insert_with(|| {
                        self.initialize(&entries[index], context, options.init_timeout)
                            .boxed()
                            .shared()
                    });
                }
            }

            let results = futures::future::join_all(
                slots
                    .iter()
                    .zip(&slot_contexts)
                    .zip(&candidates)
                    .map(|((slot, context), indices)| {
                        self.run_slot(slot, context, indices, &inits, options)
                            .instrument(tracing::info_span!("slot", %slot))
                    }),
            )
            .await;
            observe::auction_finished(slots.len(), start.elapsed());
            slots.into_iter().zip(results).collect()
        }
        .instrument(tracing::info_span!("auction", id))
        .await
    }

    async fn run_slot(
        &self,
        slot: &SlotId,
        context: &AuctionContext,
        candidates: &[usize],
        inits: &[Option<InitAttempt<'_>>],
        options: &Options,
    ) -> AggregatedSlotResult {
        let start = Instant::now();
        let entries = self.registry.entries();
        observe::candidates(
            slot,
            &candidates
                .iter()
                .map(|&index| entries[index].name.as_str())
                .collect::<Vec<_>>(),
        );

        // `join_all` keeps the input order, so results stay in registration
        // order regardless of which adapter answers first.
        let results = futures::future::join_all(candidates.iter().map(|&index| async move {
            let entry = &entries[index];
            let result = self
                .participate(entry, inits[index].clone(), slot, context, options)
                .await;
            (entry.name.clone(), sanitize(&entry.name, slot, result))
        }))
        .await;

        let aggregate = AggregatedSlotResult::merge(results);
        self.store.insert(slot.clone(), aggregate.clone());
        observe::merged(slot, &aggregate, start.elapsed());

        for entry in candidates.iter().map(|&index| &entries[index]) {
            if aggregate
                .adapters
                .get(&entry.name)
                .is_some_and(AuctionResult::has_bids)
                && guarded(&entry.name, "apply_targeting", || {
                    entry.adapter.apply_targeting(slot, context)
                })
                .is_some()
            {
                observe::targeting_applied(&entry.name, slot);
            }
        }
        aggregate
    }

    /// Registry positions of the adapters taking part in the auction of the
    /// slot, in registration order.
    fn candidates(
        &self,
        slot: &SlotId,
        context: &AuctionContext,
        options: &Options,
    ) -> Vec<usize> {
        self.registry
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, entry)| options.includes(&entry.name))
            .filter(|(_, entry)| {
                guarded(&entry.name, "has_slot_config", || {
                    entry.adapter.has_slot_config(slot, context)
                })
                .unwrap_or(false)
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Initializes the adapter if necessary and requests its bids for the
    /// slot.
    async fn participate(
        &self,
        entry: &Registered,
        init: Option<InitAttempt<'_>>,
        slot: &SlotId,
        context: &AuctionContext,
        options: &Options,
    ) -> AuctionResult {
        let initialized = match init {
            Some(init) => init.await,
            None => self.initialize(entry, context, options.init_timeout).await,
        };
        if let Err(reason) = initialized {
            return AuctionResult::failure(reason);
        }

        let start = Instant::now();
        let request = AssertUnwindSafe(entry.adapter.request_bids(slot, context, options.timeout))
            .catch_unwind();
        match tokio::time::timeout(options.timeout, request).await {
            Ok(Ok(result)) => {
                let elapsed = start.elapsed();
                observe::settled(&entry.name, slot, &result, elapsed);
                AuctionResult {
                    duration: result.duration.or(Some(elapsed)),
                    ..result
                }
            }
            Ok(Err(panic)) => {
                let elapsed = start.elapsed();
                let message = panic_message(&panic);
                observe::request_panicked(&entry.name, slot, &message, elapsed);
                AuctionResult::failure(format!("panic: {message}")).with_duration(elapsed)
            }
            // The request future is dropped here, so a late answer can not
            // reach the merged result.
            Err(_) => {
                observe::timed_out(&entry.name, slot, options.timeout);
                AuctionResult::timeout().with_duration(options.timeout)
            }
        }
    }

    /// Runs the adapter's `init` unless it already succeeded before. A
    /// failure leaves the adapter uninitialized so the next auction tries
    /// again.
    async fn initialize(
        &self,
        entry: &Registered,
        context: &AuctionContext,
        timeout: Duration,
    ) -> Result<(), String> {
        let result = entry
            .initialized
            .get_or_try_init(|| async {
                let init = AssertUnwindSafe(entry.adapter.init(context)).catch_unwind();
                match tokio::time::timeout(timeout, init).await {
                    Ok(Ok(Ok(()))) => Ok(()),
                    Ok(Ok(Err(err @ adapter::Error::Init(_)))) => Err(err.to_string()),
                    Ok(Ok(Err(err))) => Err(format!("init failed: {err}")),
                    Ok(Err(panic)) => Err(format!(
                        "init failed: panic: {}",
                        panic_message(&panic)
                    )),
                    Err(_) => Err(format!("init failed: {}", bid::TIMEOUT)),
                }
            })
            .await
            .map(|_| ());
        if let Err(reason) = &result {
            observe::init_failed(&entry.name, reason);
        }
        result
    }

    /// Removes a slot that left the page: drops its result and lets every
    /// adapter supporting it release its state for the slot.
    pub fn clear_slot(&self, slot: &SlotId) {
        let had_result = self.store.clear(slot.as_str()).is_some();
        for entry in self.registry.entries() {
            let supported = guarded(&entry.name, "capabilities", || {
                entry.adapter.capabilities().clear_slot
            })
            .unwrap_or(false);
            if supported {
                guarded(&entry.name, "clear_slot", || entry.adapter.clear_slot(slot));
            }
        }
        observe::slot_cleared(slot, had_result);
    }

    /// Debug snapshot of all registered adapters in registration order.
    pub fn adapters_state(&self) -> Vec<AdapterState> {
        self.registry
            .entries()
            .iter()
            .map(|entry| {
                let adapter = &entry.adapter;
                let capabilities =
                    guarded(&entry.name, "capabilities", || adapter.capabilities())
                        .unwrap_or_default();
                AdapterState {
                    name: entry.name.clone(),
                    library_loaded: guarded(&entry.name, "is_library_loaded", || {
                        adapter.is_library_loaded()
                    })
                    .unwrap_or(false),
                    initialized: entry.initialized.initialized(),
                    state: capabilities
                        .state
                        .then(|| guarded(&entry.name, "state", || adapter.state()))
                        .flatten(),
                }
            })
            .collect()
    }
}

/// Enforces the invariants of the result an adapter reported: a failure
/// always has a reason, every bid belongs to the adapter itself and bids
/// without a bid carry no price.
fn sanitize(adapter: &str, slot: &SlotId, mut result: AuctionResult) -> AuctionResult {
    if !result.success && result.reason.as_deref().is_none_or(str::is_empty) {
        result.reason = Some(bid::UNKNOWN_ERROR.to_owned());
    }
    result.bids.retain(|bid| match bid.bidder.as_deref() {
        None => true,
        Some(bidder) if bidder == adapter => true,
        Some(bidder) => {
            observe::foreign_bid(adapter, slot, Some(bidder));
            false
        }
    });
    for bid in &mut result.bids {
        bid.bidder = Some(adapter.to_owned());
        if !bid.has_bid {
            bid.cpm = None;
        }
    }
    result
}

/// Calls a synchronous adapter operation. A panic is logged and turns into
/// `None` so that one broken adapter can not take down the auction.
fn guarded<T>(adapter: &str, operation: &str, call: impl FnOnce() -> T) -> Option<T> {
    match std::panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(value) => Some(value),
        Err(panic) => {
            observe::adapter_panicked(adapter, operation, &panic_message(&panic));
            None
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
