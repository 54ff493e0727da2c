//! Error taxonomy for the segmentation core

use std::fmt;

use polars::prelude::PolarsError;
use thiserror::Error;

/// The three scored axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Recency,
    Frequency,
    Monetary,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Recency => "recency",
            Metric::Frequency => "frequency",
            Metric::Monetary => "monetary",
        };
        f.write_str(name)
    }
}

/// Fatal failures of a segmentation run. None of them are retried: the input
/// is a static batch and would fail the same way again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationError {
    #[error("no customers to segment: {total_lines} input lines, {filtered_lines} survived filtering")]
    Aggregation {
        total_lines: usize,
        filtered_lines: usize,
    },

    #[error(
        "cannot form quantile bins for {metric} over {customers} customers ({distinct} distinct values): {reason}"
    )]
    DegenerateDistribution {
        metric: Metric,
        customers: usize,
        distinct: usize,
        reason: String,
    },

    #[error("score code {code:?} matches no segment rule{}", customer_suffix(.customer_id))]
    UnclassifiedCode {
        code: String,
        customer_id: Option<String>,
    },

    #[error("bin count {num_bins} is outside 2..={max}; score codes must stay two characters")]
    InvalidBinCount { num_bins: usize, max: usize },

    #[error("dataframe operation failed: {0}")]
    Frame(String),
}

impl From<PolarsError> for SegmentationError {
    fn from(err: PolarsError) -> Self {
        SegmentationError::Frame(err.to_string())
    }
}

fn customer_suffix(customer_id: &Option<String>) -> String {
    match customer_id {
        Some(id) => format!(" (customer {id})"),
        None => String::new(),
    }
}
