//! End-to-end segmentation: filter, aggregate, score, classify

use tracing::info;

use crate::config::SegmentationConfig;
use crate::data::{filter_lines_with_stats, TransactionLine};
use crate::error::SegmentationError;
use crate::rfm::aggregate;
use crate::score::score_profiles;
use crate::segment::{classify_profiles, SegmentedProfile};

/// Run the whole batch. Each stage sees the complete output of the one
/// before it; any failure aborts the run without partial results.
pub fn segment_customers(
    lines: &[TransactionLine],
    config: &SegmentationConfig,
) -> Result<Vec<SegmentedProfile>, SegmentationError> {
    let (filtered, stats) = filter_lines_with_stats(lines, &config.cancellation_marker)?;
    info!(
        total = lines.len(),
        kept = stats.kept,
        dropped = stats.dropped(),
        "filtered transaction lines"
    );

    if filtered.height() == 0 {
        return Err(SegmentationError::Aggregation {
            total_lines: lines.len(),
            filtered_lines: 0,
        });
    }

    let profiles = aggregate(&filtered, config.reference_date)?;
    let scored = score_profiles(&profiles, config.num_bins)?;
    let segmented = classify_profiles(scored, &config.segment_rules)?;

    info!(customers = segmented.len(), "segmentation complete");
    Ok(segmented)
}
