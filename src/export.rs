//! CSV output of segmented profiles and segment customer lists

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::segment::{Segment, SegmentedProfile};

/// Flat row of the segmented profile table
#[derive(Debug, Serialize)]
struct ProfileRow<'a> {
    customer_id: &'a str,
    recency: i64,
    frequency: usize,
    monetary: f64,
    recency_score: u8,
    frequency_score: u8,
    monetary_score: u8,
    score_code: String,
    segment: Segment,
}

#[derive(Debug, Serialize)]
struct CustomerRow<'a> {
    customer_id: &'a str,
}

impl<'a> From<&'a SegmentedProfile> for ProfileRow<'a> {
    fn from(p: &'a SegmentedProfile) -> Self {
        let scored = &p.scored;
        ProfileRow {
            customer_id: &scored.profile.customer_id,
            recency: scored.profile.recency,
            frequency: scored.profile.frequency,
            monetary: scored.profile.monetary,
            recency_score: scored.recency_score,
            frequency_score: scored.frequency_score,
            monetary_score: scored.monetary_score,
            score_code: scored.score_code.to_string(),
            segment: p.segment,
        }
    }
}

/// Write the full segmented table
pub fn write_profiles<P: AsRef<Path>>(path: P, profiles: &[SegmentedProfile]) -> crate::Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for profile in profiles {
        writer.serialize(ProfileRow::from(profile))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a single `customer_id` column
pub fn write_customer_ids<P: AsRef<Path>>(path: P, customer_ids: &[String]) -> crate::Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    // header even when the segment is empty
    writer.write_record(["customer_id"])?;
    for id in customer_ids {
        writer.write_record([id.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfm::CustomerProfile;
    use crate::score::{ScoreCode, ScoredProfile};
    use chrono::{NaiveDate, NaiveTime};
    use tempfile::NamedTempFile;

    fn sample() -> SegmentedProfile {
        SegmentedProfile {
            scored: ScoredProfile {
                profile: CustomerProfile {
                    customer_id: "12347".to_string(),
                    recency: 3,
                    frequency: 7,
                    monetary: 4310.0,
                    last_purchase: NaiveDate::from_ymd_opt(2011, 12, 7).unwrap().and_time(NaiveTime::MIN),
                },
                recency_score: 5,
                frequency_score: 5,
                monetary_score: 5,
                score_code: ScoreCode::new(5, 5),
            },
            segment: Segment::Champions,
        }
    }

    #[test]
    fn test_write_profiles() {
        let file = NamedTempFile::new().unwrap();
        write_profiles(file.path(), &[sample()]).unwrap();

        let written = std::fs::read_to_string(file.path()).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next(),
            Some("customer_id,recency,frequency,monetary,recency_score,frequency_score,monetary_score,score_code,segment")
        );
        assert_eq!(lines.next(), Some("12347,3,7,4310.0,5,5,5,55,champions"));
    }

    #[test]
    fn test_write_customer_ids() {
        let file = NamedTempFile::new().unwrap();
        write_customer_ids(file.path(), &["12347".to_string(), "14911".to_string()]).unwrap();
        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "customer_id\n12347\n14911\n");

        write_customer_ids(file.path(), &[]).unwrap();
        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "customer_id\n");
    }
}
