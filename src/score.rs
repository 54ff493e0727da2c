//! Population-relative quantile scoring of customer profiles

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use tracing::{debug, info};

use crate::config::MAX_BINS;
use crate::error::{Metric, SegmentationError};
use crate::rfm::CustomerProfile;

/// Recency score followed by frequency score, e.g. `"34"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScoreCode {
    pub recency: u8,
    pub frequency: u8,
}

impl ScoreCode {
    pub fn new(recency: u8, frequency: u8) -> Self {
        Self { recency, frequency }
    }
}

impl fmt::Display for ScoreCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.recency, self.frequency)
    }
}

impl FromStr for ScoreCode {
    type Err = SegmentationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unclassified = || SegmentationError::UnclassifiedCode {
            code: s.to_string(),
            customer_id: None,
        };

        let mut chars = s.chars();
        let (Some(r), Some(f), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(unclassified());
        };
        let digit = |c: char| c.to_digit(10).filter(|d| (1..=9).contains(d)).map(|d| d as u8);

        match (digit(r), digit(f)) {
            (Some(recency), Some(frequency)) => Ok(Self::new(recency, frequency)),
            _ => Err(unclassified()),
        }
    }
}

/// A customer profile with its three ordinal scores
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProfile {
    pub profile: CustomerProfile,
    pub recency_score: u8,
    pub frequency_score: u8,
    pub monetary_score: u8,
    pub score_code: ScoreCode,
}

/// Score every profile on recency, frequency and monetary.
///
/// Recency is binned on the raw day count and inverted so that the most
/// recent bin scores highest. Frequency is binned on its first-seen rank
/// because raw invoice counts tie too heavily to cut. Monetary is binned on
/// the raw value.
///
/// `num_bins` must lie in `2..=MAX_BINS` so every score is a single digit.
pub fn score_profiles(
    profiles: &[CustomerProfile],
    num_bins: usize,
) -> Result<Vec<ScoredProfile>, SegmentationError> {
    if !(2..=MAX_BINS).contains(&num_bins) {
        return Err(SegmentationError::InvalidBinCount {
            num_bins,
            max: MAX_BINS,
        });
    }

    let recency: Vec<f64> = profiles.iter().map(|p| p.recency as f64).collect();
    let frequency: Vec<f64> = profiles.iter().map(|p| p.frequency as f64).collect();
    let monetary: Vec<f64> = profiles.iter().map(|p| p.monetary).collect();

    let recency_bins = qcut(&recency, num_bins, Metric::Recency)?;
    let frequency_bins = qcut(&rank_first(&frequency)?, num_bins, Metric::Frequency)?;
    let monetary_bins = qcut(&monetary, num_bins, Metric::Monetary)?;

    let scored: Vec<ScoredProfile> = profiles
        .iter()
        .enumerate()
        .map(|(i, profile)| {
            let recency_score = to_score(num_bins - recency_bins[i]);
            let frequency_score = to_score(frequency_bins[i] + 1);
            ScoredProfile {
                profile: profile.clone(),
                recency_score,
                frequency_score,
                monetary_score: to_score(monetary_bins[i] + 1),
                score_code: ScoreCode::new(recency_score, frequency_score),
            }
        })
        .collect();

    info!(customers = scored.len(), bins = num_bins, "scored customer profiles");
    Ok(scored)
}

fn to_score(value: usize) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

/// Ranks `1..=n` in ascending value order; equal values are ranked in the
/// order they appear.
pub fn rank_first(values: &[f64]) -> Result<Vec<f64>, SegmentationError> {
    let ranked = df!("value" => values.to_vec())?
        .lazy()
        .select([col("value")
            .rank(
                RankOptions {
                    method: RankMethod::Ordinal,
                    descending: false,
                },
                None,
            )
            .cast(DataType::Float64)])
        .collect()?;

    Ok(ranked.column("value")?.f64()?.into_no_null_iter().collect())
}

/// Quantile edges `e_0..=e_bins` using linear interpolation between order
/// statistics, at position `k/bins * (n - 1)`. `values` must be non-empty.
pub fn quantile_edges(values: &[f64], num_bins: usize) -> Result<Vec<f64>, SegmentationError> {
    let quantiles: Vec<Expr> = (0..=num_bins)
        .map(|k| {
            col("value")
                .quantile(lit(k as f64 / num_bins as f64), QuantileMethod::Linear)
                .alias(format!("e{k}"))
        })
        .collect();
    let edges_df = df!("value" => values.to_vec())?.lazy().select(quantiles).collect()?;

    (0..=num_bins)
        .map(|k| {
            edges_df
                .column(&format!("e{k}"))?
                .f64()?
                .get(0)
                .ok_or_else(|| SegmentationError::Frame(format!("quantile edge {k} is null")))
        })
        .collect()
}

/// Assign each value to one of `num_bins` quantile bins, returning the
/// zero-based bin index per value.
///
/// Bins are right-closed with the first bin also closed on the left, so a
/// value sitting on an edge falls into the lower bin. Fails instead of
/// approximating when the edges collapse or any bin would be empty.
pub fn qcut(values: &[f64], num_bins: usize, metric: Metric) -> Result<Vec<usize>, SegmentationError> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mut distinct = sorted.clone();
    distinct.dedup();

    let degenerate = |reason: String| SegmentationError::DegenerateDistribution {
        metric,
        customers: values.len(),
        distinct: distinct.len(),
        reason,
    };

    if num_bins == 0 {
        return Err(degenerate("bin count must be positive".to_string()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(degenerate("values must be finite".to_string()));
    }
    if distinct.len() < num_bins {
        return Err(degenerate(format!(
            "need at least {num_bins} distinct values"
        )));
    }

    let edges = quantile_edges(&sorted, num_bins)?;
    debug!(%metric, ?edges, "quantile edges");
    if let Some(pair) = edges.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(degenerate(format!("bin edge {} is not unique", pair[1])));
    }

    let inner = &edges[1..num_bins];
    let bins: Vec<usize> = values
        .iter()
        .map(|&v| inner.partition_point(|&edge| edge < v))
        .collect();

    let mut counts = vec![0usize; num_bins];
    for &bin in &bins {
        counts[bin] += 1;
    }
    if let Some(empty) = counts.iter().position(|&count| count == 0) {
        return Err(degenerate(format!(
            "bin {} of {num_bins} would be empty",
            empty + 1
        )));
    }

    Ok(bins)
}
