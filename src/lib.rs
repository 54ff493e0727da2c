//! rfmforge: RFM customer segmentation over a sales ledger
//!
//! Transaction lines are filtered, aggregated into one recency/frequency/
//! monetary profile per customer, scored by population quantiles and
//! classified into named marketing segments.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod rfm;
pub mod score;
pub mod segment;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{ConfigError, SegmentationConfig};
pub use data::{filter_lines, load_transactions, FilterStats, TransactionLine};
pub use error::{Metric, SegmentationError};
pub use pipeline::segment_customers;
pub use report::{customers_in_segment, summarize_segments, SegmentSummary};
pub use rfm::{aggregate, CustomerProfile};
pub use score::{score_profiles, ScoreCode, ScoredProfile};
pub use segment::{Segment, SegmentRule, SegmentRules, SegmentedProfile};

/// Common result type used at the I/O boundary
pub type Result<T> = anyhow::Result<T>;
