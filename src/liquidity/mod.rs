//! Liquidity: demand segments versus pooled supply, and replenishment.

mod analyzer;
mod service;

pub use analyzer::{analyze, matches_supply, segment_label, LiquidityReport, Segment, ANY_FIELD};
pub use service::{LiquidityService, TriggerScrapeOutcome, WorkflowCallback};
