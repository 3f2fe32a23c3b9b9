//! A generic server-to-server bidder reached over HTTP.
//!
//! The bidder receives the slot, its ad unit and the auction context as JSON
//! and answers with a list of bids:
//!
//! ```text
//! POST <endpoint>
//! {"slot": "top", "adUnit": {...}, "context": {...}, "timeoutMs": 1000}
//!
//! 200 OK
//! {"bids": [{"cpm": 1.25, "targeting": {"hb_pb": "1.20"}, "payload": {...}}]}
//! ```

use {
    super::{AdUnit, Adapter, Capabilities, Error, GRACE},
    crate::domain::{AuctionContext, AuctionResult, BidResult, SlotId},
    anyhow::{Context, anyhow},
    dashmap::DashMap,
    std::{collections::HashMap, time::Duration},
    tokio::{sync::OnceCell, time::Instant},
    url::Url,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    /// Human readable name of the bidder used in failure reasons.
    pub library: String,
    pub endpoint: Url,
    pub ad_units: HashMap<SlotId, AdUnit>,
}

#[derive(Debug, Default)]
struct SlotBids {
    bids: Vec<BidResult>,
    applied: bool,
}

pub struct HttpAdapter {
    config: Config,
    client: OnceCell<reqwest::Client>,
    /// Bids of the latest request per slot.
    slots: DashMap<SlotId, SlotBids>,
}

impl HttpAdapter {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: OnceCell::new(),
            slots: Default::default(),
        }
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        request: &dto::Request<'_>,
        timeout: Duration,
    ) -> anyhow::Result<dto::Response> {
        tracing::trace!(
            adapter = %self.config.name,
            url = %self.config.endpoint,
            slot = %request.slot,
            "bid request"
        );
        let response = client
            .post(self.config.endpoint.clone())
            .json(request)
            .timeout(timeout + GRACE)
            .send()
            .await
            .context("send")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("bad status {status}: {text}"));
        }
        response.json().await.context("bad json")
    }
}

#[async_trait::async_trait]
impl Adapter for HttpAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_library_loaded(&self) -> bool {
        self.client.initialized()
    }

    async fn init(&self, _context: &AuctionContext) -> Result<(), Error> {
        self.client
            .get_or_try_init(|| async {
                tracing::debug!(adapter = %self.config.name, "building http client");
                reqwest::Client::builder()
                    .build()
                    .context("build http client")
                    .map_err(Error::Init)
            })
            .await
            .map(|_| ())
    }

    fn has_slot_config(&self, slot: &SlotId, _context: &AuctionContext) -> bool {
        self.config.ad_units.contains_key(slot)
    }

    fn get_ad_unit(&self, slot: &SlotId, context: &AuctionContext) -> Option<AdUnit> {
        let mut ad_unit = self.config.ad_units.get(slot)?.clone();
        if ad_unit.sizes.is_empty() {
            ad_unit.sizes = context.sizes.clone();
        }
        Some(ad_unit)
    }

    async fn request_bids(
        &self,
        slot: &SlotId,
        context: &AuctionContext,
        timeout: Duration,
    ) -> AuctionResult {
        let Some(client) = self.client.get() else {
            return Error::LibraryNotLoaded(self.config.library.clone()).into();
        };
        let Some(ad_unit) = self.get_ad_unit(slot, context) else {
            return Error::ConfigMissing.into();
        };

        let start = Instant::now();
        let request = dto::Request {
            slot,
            ad_unit: &ad_unit,
            context,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        };
        let response = match self.fetch(client, &request, timeout).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(adapter = %self.config.name, %slot, ?err, "bid request failed");
                self.slots.remove(slot);
                return Error::Vendor(err).into();
            }
        };

        let latency = start.elapsed();
        let bids = response.into_domain(slot, &self.config.name, latency);
        self.slots.insert(
            slot.clone(),
            SlotBids {
                bids: bids.clone(),
                applied: false,
            },
        );
        AuctionResult::success(bids).with_duration(latency)
    }

    fn apply_targeting(&self, slot: &SlotId, context: &AuctionContext) {
        let Some(mut entry) = self.slots.get_mut(slot) else {
            return;
        };
        if !entry.bids.iter().any(|bid| bid.has_bid) {
            return;
        }
        entry.applied = true;
        tracing::debug!(
            adapter = %self.config.name,
            %slot,
            ad_server_slot = ?context.ad_server_slot,
            bids = entry.bids.len(),
            "applied targeting"
        );
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            clear_slot: true,
            state: true,
        }
    }

    fn clear_slot(&self, slot: &SlotId) {
        self.slots.remove(slot);
    }

    fn state(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut state = serde_json::Map::new();
        state.insert("endpoint".into(), self.config.endpoint.as_str().into());
        let slots = self
            .slots
            .iter()
            .map(|entry| {
                let value = serde_json::json!({
                    "bids": entry.bids.iter().filter(|bid| bid.has_bid).count(),
                    "applied": entry.applied,
                });
                (entry.key().to_string(), value)
            })
            .collect::<serde_json::Map<_, _>>();
        state.insert("slots".into(), slots.into());
        state
    }
}

mod dto {
    use {
        crate::{
            adapter::AdUnit,
            domain::{AuctionContext, BidResult, SlotId, Targeting},
        },
        serde::{Deserialize, Serialize},
        std::time::Duration,
    };

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Request<'a> {
        pub slot: &'a SlotId,
        pub ad_unit: &'a AdUnit,
        pub context: &'a AuctionContext,
        pub timeout_ms: u64,
    }

    #[derive(Debug, Deserialize)]
    pub struct Response {
        #[serde(default)]
        pub bids: Vec<Bid>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Bid {
        pub cpm: f64,
        #[serde(default)]
        pub targeting: Targeting,
        #[serde(default)]
        pub payload: Option<serde_json::Value>,
    }

    impl Response {
        /// Converts the bids of the response. Bids without a positive price
        /// are reported as no bid.
        pub fn into_domain(
            self,
            slot: &SlotId,
            bidder: &str,
            latency: Duration,
        ) -> Vec<BidResult> {
            if self.bids.is_empty() {
                return vec![BidResult::no_bid(slot.clone(), bidder).with_latency(latency)];
            }
            self.bids
                .into_iter()
                .map(|bid| {
                    let mut result = if bid.cpm > 0. {
                        BidResult::bid(slot.clone(), bidder, bid.cpm)
                    } else {
                        BidResult::no_bid(slot.clone(), bidder)
                    }
                    .with_latency(latency);
                    if result.has_bid {
                        result.targeting = bid.targeting;
                    }
                    result.payload = bid.payload;
                    result
                })
                .collect()
        }
    }
}
