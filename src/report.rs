//! Per-segment summaries and customer lists

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::segment::{Segment, SegmentedProfile};

/// Aggregate figures for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub count: usize,
    /// Fraction of all segmented customers
    pub share: f64,
    pub monetary_min: f64,
    pub monetary_max: f64,
    pub monetary_mean: f64,
    pub recency_mean: f64,
    pub frequency_mean: f64,
}

#[derive(Default)]
struct Totals {
    count: usize,
    monetary_min: f64,
    monetary_max: f64,
    monetary_sum: f64,
    recency_sum: f64,
    frequency_sum: f64,
}

/// Summaries for every segment that has customers, in segment order
pub fn summarize_segments(profiles: &[SegmentedProfile]) -> Vec<SegmentSummary> {
    let mut totals: BTreeMap<Segment, Totals> = BTreeMap::new();

    for profile in profiles {
        let customer = &profile.scored.profile;
        let entry = totals.entry(profile.segment).or_default();
        if entry.count == 0 {
            entry.monetary_min = customer.monetary;
            entry.monetary_max = customer.monetary;
        } else {
            entry.monetary_min = entry.monetary_min.min(customer.monetary);
            entry.monetary_max = entry.monetary_max.max(customer.monetary);
        }
        entry.count += 1;
        entry.monetary_sum += customer.monetary;
        entry.recency_sum += customer.recency as f64;
        entry.frequency_sum += customer.frequency as f64;
    }

    let population = profiles.len() as f64;
    totals
        .into_iter()
        .map(|(segment, t)| {
            let count = t.count as f64;
            SegmentSummary {
                segment,
                count: t.count,
                share: count / population,
                monetary_min: t.monetary_min,
                monetary_max: t.monetary_max,
                monetary_mean: t.monetary_sum / count,
                recency_mean: t.recency_sum / count,
                frequency_mean: t.frequency_sum / count,
            }
        })
        .collect()
}

/// Customer ids in `segment`, in profile order
pub fn customers_in_segment(profiles: &[SegmentedProfile], segment: Segment) -> Vec<String> {
    profiles
        .iter()
        .filter(|p| p.segment == segment)
        .map(|p| p.customer_id().to_string())
        .collect()
}

/// Fixed-width table for terminal output
pub fn format_summary_table(summaries: &[SegmentSummary]) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{:<20} {:>7} {:>7} {:>10} {:>12} {:>12} {:>9} {:>9}",
        "segment", "count", "share", "min", "max", "mean", "recency", "freq"
    );
    for s in summaries {
        let _ = writeln!(
            output,
            "{:<20} {:>7} {:>6.1}% {:>10.2} {:>12.2} {:>12.2} {:>9.1} {:>9.1}",
            s.segment.as_str(),
            s.count,
            s.share * 100.0,
            s.monetary_min,
            s.monetary_max,
            s.monetary_mean,
            s.recency_mean,
            s.frequency_mean
        );
    }
    output
}

/// Markdown report of the segmentation run
pub fn build_report(reference_date: NaiveDate, profiles: &[SegmentedProfile]) -> String {
    let summaries = summarize_segments(profiles);
    let mut output = String::new();

    let _ = writeln!(output, "# RFM Segmentation Report");
    let _ = writeln!(
        output,
        "{} customers, recency measured against {}",
        profiles.len(),
        reference_date
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Segments");

    if summaries.is_empty() {
        let _ = writeln!(output, "No customers were segmented.");
        return output;
    }

    let _ = writeln!(
        output,
        "| segment | customers | share | monetary min | monetary max | monetary mean | mean recency | mean frequency |"
    );
    let _ = writeln!(output, "|---|---:|---:|---:|---:|---:|---:|---:|");
    for s in &summaries {
        let _ = writeln!(
            output,
            "| {} | {} | {:.1}% | {:.2} | {:.2} | {:.2} | {:.1} | {:.1} |",
            s.segment,
            s.count,
            s.share * 100.0,
            s.monetary_min,
            s.monetary_max,
            s.monetary_mean,
            s.recency_mean,
            s.frequency_mean
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Largest Segment");
    if let Some(largest) = summaries.iter().max_by_key(|s| s.count) {
        let _ = writeln!(
            output,
            "- {} with {} customers spending {:.2} on average",
            largest.segment, largest.count, largest.monetary_mean
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfm::CustomerProfile;
    use crate::score::{ScoreCode, ScoredProfile};
    use chrono::NaiveTime;

    fn segmented(id: &str, recency: i64, frequency: usize, monetary: f64, segment: Segment) -> SegmentedProfile {
        SegmentedProfile {
            scored: ScoredProfile {
                profile: CustomerProfile {
                    customer_id: id.to_string(),
                    recency,
                    frequency,
                    monetary,
                    last_purchase: NaiveDate::from_ymd_opt(2011, 11, 1).unwrap().and_time(NaiveTime::MIN),
                },
                recency_score: 1,
                frequency_score: 1,
                monetary_score: 1,
                score_code: ScoreCode::new(1, 1),
            },
            segment,
        }
    }

    fn profiles() -> Vec<SegmentedProfile> {
        vec![
            segmented("17850", 300, 1, 120.0, Segment::Hibernating),
            segmented("13047", 2, 12, 4200.0, Segment::Champions),
            segmented("12346", 320, 2, 80.0, Segment::Hibernating),
            segmented("14911", 45, 9, 900.0, Segment::LoyalCustomers),
        ]
    }

    #[test]
    fn test_summarize_segments() {
        let summaries = summarize_segments(&profiles());
        assert_eq!(summaries.len(), 3);

        // ordered like the Segment enum
        assert_eq!(summaries[0].segment, Segment::Hibernating);
        assert_eq!(summaries[1].segment, Segment::LoyalCustomers);
        assert_eq!(summaries[2].segment, Segment::Champions);

        let hibernating = &summaries[0];
        assert_eq!(hibernating.count, 2);
        assert_eq!(hibernating.share, 0.5);
        assert_eq!(hibernating.monetary_min, 80.0);
        assert_eq!(hibernating.monetary_max, 120.0);
        assert_eq!(hibernating.monetary_mean, 100.0);
        assert_eq!(hibernating.recency_mean, 310.0);
        assert_eq!(hibernating.frequency_mean, 1.5);
    }

    #[test]
    fn test_customers_in_segment() {
        let profiles = profiles();
        assert_eq!(
            customers_in_segment(&profiles, Segment::Hibernating),
            vec!["17850".to_string(), "12346".to_string()]
        );
        assert!(customers_in_segment(&profiles, Segment::Promising).is_empty());
    }

    #[test]
    fn test_build_report() {
        let date = NaiveDate::from_ymd_opt(2011, 12, 11).unwrap();
        let report = build_report(date, &profiles());

        assert!(report.contains("4 customers, recency measured against 2011-12-11"));
        assert!(report.contains("| hibernating | 2 | 50.0% | 80.00 | 120.00 | 100.00 | 310.0 | 1.5 |"));
        assert!(report.contains("- hibernating with 2 customers"));

        let empty = build_report(date, &[]);
        assert!(empty.contains("No customers were segmented."));
    }

    #[test]
    fn test_format_summary_table() {
        let table = format_summary_table(&summarize_segments(&profiles()));
        assert_eq!(table.lines().count(), 4);
        assert!(table.lines().nth(1).unwrap().starts_with("hibernating"));
    }
}
