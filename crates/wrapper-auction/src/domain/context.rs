use {
    super::{SlotId, Size},
    serde::Serialize,
    std::collections::{BTreeMap, HashMap},
};

/// Everything an adapter may base its bid on for one slot of one auction.
///
/// A context is built once per slot and auction and shared read-only between
/// all adapters taking part in that slot's auction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionContext {
    pub slot: SlotId,
    /// Resolved targeting dimensions (geo, pagetype, ...). A `None` value
    /// means the dimension is known but has no value on this page.
    pub dimensions: BTreeMap<String, Option<String>>,
    pub viewport: String,
    pub page_id: Option<String>,
    pub site_id: Option<String>,
    pub zone_id: Option<String>,
    /// 1 on the initial page load, 2 and above on refreshes.
    pub refresh: u32,
    /// Explicit sizes for the slot. Empty if the slot does not define any.
    pub sizes: Vec<Size>,
    /// The ad server's own reference for the slot, handed to adapters when
    /// they apply targeting.
    pub ad_server_slot: Option<String>,
}

impl AuctionContext {
    pub fn new(slot: SlotId) -> Self {
        Self {
            slot,
            dimensions: Default::default(),
            viewport: Default::default(),
            page_id: None,
            site_id: None,
            zone_id: None,
            refresh: 1,
            sizes: Vec::new(),
            ad_server_slot: None,
        }
    }

    pub fn is_refresh(&self) -> bool {
        self.refresh >= 2
    }

    /// Value of a dimension. Absent and valueless dimensions both yield `None`.
    pub fn dimension(&self, key: &str) -> Option<&str> {
        self.dimensions.get(key)?.as_deref()
    }
}

/// Supplies the immutable per-slot context of an auction.
pub trait ContextBuilder: Send + Sync {
    fn build(&self, slot: &SlotId) -> AuctionContext;
}

impl<F> ContextBuilder for F
where
    F: Fn(&SlotId) -> AuctionContext + Send + Sync,
{
    fn build(&self, slot: &SlotId) -> AuctionContext {
        self(slot)
    }
}

/// Page-wide inputs from which the context of every slot on the page is
/// derived.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    pub dimensions: BTreeMap<String, Option<String>>,
    pub viewport: String,
    pub page_id: Option<String>,
    pub site_id: Option<String>,
    pub zone_id: Option<String>,
    pub refresh: u32,
    pub slot_sizes: HashMap<SlotId, Vec<Size>>,
    pub ad_server_slots: HashMap<SlotId, String>,
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            dimensions: Default::default(),
            viewport: Default::default(),
            page_id: None,
            site_id: None,
            zone_id: None,
            refresh: 1,
            slot_sizes: Default::default(),
            ad_server_slots: Default::default(),
        }
    }
}

impl ContextBuilder for PageContext {
    fn build(&self, slot: &SlotId) -> AuctionContext {
        AuctionContext {
            slot: slot.clone(),
            dimensions: self.dimensions.clone(),
            viewport: self.viewport.clone(),
            page_id: self.page_id.clone(),
            site_id: self.site_id.clone(),
            zone_id: self.zone_id.clone(),
            refresh: self.refresh,
            sizes: self.slot_sizes.get(slot).cloned().unwrap_or_default(),
            ad_server_slot: self.ad_server_slots.get(slot).cloned(),
        }
    }
}
