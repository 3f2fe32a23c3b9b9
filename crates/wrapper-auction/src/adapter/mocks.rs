//! Configurable adapters for tests and local experiments.

use {
    super::{AdUnit, Adapter, Capabilities, Error},
    crate::domain::{AuctionContext, AuctionResult, BidResult, SlotId},
    anyhow::anyhow,
    std::{
        collections::HashSet,
        sync::{
            Mutex,
            PoisonError,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    },
    tokio::sync::OnceCell,
};

#[derive(Debug, Clone)]
enum Behavior {
    Bid,
    Fail(String),
    Panic,
    Hang,
}

/// An adapter answering every request the same configurable way.
///
/// By default it is loaded, takes part in every slot and answers immediately
/// without a bid.
#[derive(Debug)]
pub struct FakeAdapter {
    name: String,
    loaded: bool,
    slots: Option<HashSet<SlotId>>,
    bids: Vec<(f64, Vec<(String, String)>)>,
    delay: Duration,
    behavior: Behavior,
    init_failure: Option<String>,
    init_hangs: bool,
    broken_config: bool,
    initialized: OnceCell<()>,
    inits: AtomicUsize,
    requests: AtomicUsize,
    applied: Mutex<Vec<SlotId>>,
    cleared: Mutex<Vec<SlotId>>,
}

impl FakeAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            loaded: true,
            slots: None,
            bids: Vec::new(),
            delay: Duration::ZERO,
            behavior: Behavior::Bid,
            init_failure: None,
            init_hangs: false,
            broken_config: false,
            initialized: OnceCell::new(),
            inits: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            applied: Default::default(),
            cleared: Default::default(),
        }
    }

    /// Adds a bid with the given targeting to every answer.
    pub fn with_bid(mut self, cpm: f64, targeting: &[(&str, &str)]) -> Self {
        let targeting = targeting
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        self.bids.push((cpm, targeting));
        self
    }

    /// Restricts the adapter to the given slots.
    pub fn only_for(mut self, slots: &[&str]) -> Self {
        self.slots = Some(slots.iter().map(|slot| SlotId::from(*slot)).collect());
        self
    }

    /// Answers only after the delay passed.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.behavior = Behavior::Fail(reason.to_owned());
        self
    }

    /// Panics inside the vendor call, violating the adapter contract.
    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    /// Never answers.
    pub fn hanging(mut self) -> Self {
        self.behavior = Behavior::Hang;
        self
    }

    pub fn failing_init(mut self, reason: &str) -> Self {
        self.init_failure = Some(reason.to_owned());
        self
    }

    /// Never finishes its setup.
    pub fn hanging_init(mut self) -> Self {
        self.init_hangs = true;
        self
    }

    /// Panics when asked whether it serves a slot.
    pub fn with_broken_config(mut self) -> Self {
        self.broken_config = true;
        self
    }

    pub fn unloaded(mut self) -> Self {
        self.loaded = false;
        self
    }

    /// How often the underlying setup ran.
    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Slots targeting was applied to, in call order.
    pub fn applied(&self) -> Vec<SlotId> {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Slots that were cleared, in call order.
    pub fn cleared(&self) -> Vec<SlotId> {
        self.cleared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn answer(&self, slot: &SlotId) -> AuctionResult {
        let bids = self
            .bids
            .iter()
            .map(|(cpm, targeting)| {
                targeting.iter().fold(
                    BidResult::bid(slot.clone(), &self.name, *cpm).with_latency(self.delay),
                    |bid, (key, value)| bid.with_targeting(key, value.as_str()),
                )
            })
            .collect::<Vec<_>>();
        if bids.is_empty() {
            AuctionResult::success(vec![BidResult::no_bid(slot.clone(), &self.name)])
        } else {
            AuctionResult::success(bids)
        }
    }
}

#[async_trait::async_trait]
impl Adapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_library_loaded(&self) -> bool {
        self.loaded
    }

    async fn init(&self, _context: &AuctionContext) -> Result<(), Error> {
        self.initialized
            .get_or_try_init(|| async {
                self.inits.fetch_add(1, Ordering::SeqCst);
                if self.init_hangs {
                    futures::future::pending::<()>().await;
                }
                match &self.init_failure {
                    Some(reason) => Err(Error::Init(anyhow!("{reason}"))),
                    None => Ok(()),
                }
            })
            .await
            .map(|_| ())
    }

    fn has_slot_config(&self, slot: &SlotId, _context: &AuctionContext) -> bool {
        if self.broken_config {
            panic!("{} slot config is corrupt", self.name);
        }
        self.slots
            .as_ref()
            .is_none_or(|slots| slots.contains(slot))
    }

    fn get_ad_unit(&self, slot: &SlotId, context: &AuctionContext) -> Option<AdUnit> {
        self.has_slot_config(slot, context).then(|| AdUnit {
            code: format!("{}-{slot}", self.name),
            sizes: context.sizes.clone(),
            params: Default::default(),
        })
    }

    async fn request_bids(
        &self,
        slot: &SlotId,
        context: &AuctionContext,
        _timeout: Duration,
    ) -> AuctionResult {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.loaded {
            return Error::LibraryNotLoaded(self.name.clone()).into();
        }
        if self.get_ad_unit(slot, context).is_none() {
            return Error::ConfigMissing.into();
        }
        tokio::time::sleep(self.delay).await;
        match &self.behavior {
            Behavior::Bid => self.answer(slot),
            Behavior::Fail(reason) => Error::Vendor(anyhow!("{reason}")).into(),
            Behavior::Panic => panic!("{} vendor library crashed", self.name),
            Behavior::Hang => futures::future::pending().await,
        }
    }

    fn apply_targeting(&self, slot: &SlotId, _context: &AuctionContext) {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(slot.clone());
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            clear_slot: true,
            state: true,
        }
    }

    fn clear_slot(&self, slot: &SlotId) {
        self.cleared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(slot.clone());
    }

    fn state(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut state = serde_json::Map::new();
        state.insert("inits".into(), self.init_count().into());
        state.insert("requests".into(), self.request_count().into());
        state
    }
}
