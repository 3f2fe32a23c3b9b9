//! Core value types of an auction. None of them perform I/O.

pub mod aggregate;
pub mod bid;
pub mod context;
pub mod slot;

pub use {
    aggregate::AggregatedSlotResult,
    bid::{AuctionResult, BidResult, Targeting, TargetingValue},
    context::{AuctionContext, ContextBuilder, PageContext},
    slot::{SlotId, Size},
};
