use {
    crate::domain::{AggregatedSlotResult, SlotId},
    dashmap::DashMap,
    std::{collections::HashMap, sync::Arc},
};

/// The latest auction result of every slot.
///
/// Cloning yields another handle to the same store. Only the orchestrator
/// writes to it; everybody else reads without ever triggering an auction.
#[derive(Debug, Clone, Default)]
pub struct ResultStore(Arc<DashMap<SlotId, AggregatedSlotResult>>);

impl ResultStore {
    pub fn get(&self, slot: &str) -> Option<AggregatedSlotResult> {
        self.0.get(slot).map(|entry| entry.value().clone())
    }

    pub fn get_all(&self) -> HashMap<SlotId, AggregatedSlotResult> {
        self.0
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Forgets the slot. Called when the slot is removed from the page.
    pub fn clear(&self, slot: &str) -> Option<AggregatedSlotResult> {
        self.0.remove(slot).map(|(_, result)| result)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replaces the result of the slot.
    pub(crate) fn insert(&self, slot: SlotId, result: AggregatedSlotResult) {
        self.0.insert(slot, result);
    }
}
