//! Segment classification from recency/frequency score codes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SegmentationError;
use crate::score::{ScoreCode, ScoredProfile};

/// Marketing segments, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Hibernating,
    AtRisk,
    CantLoose,
    AboutToSleep,
    NeedAttention,
    LoyalCustomers,
    Promising,
    NewCustomers,
    PotentialLoyalists,
    Champions,
}

impl Segment {
    pub const ALL: [Segment; 10] = [
        Segment::Hibernating,
        Segment::AtRisk,
        Segment::CantLoose,
        Segment::AboutToSleep,
        Segment::NeedAttention,
        Segment::LoyalCustomers,
        Segment::Promising,
        Segment::NewCustomers,
        Segment::PotentialLoyalists,
        Segment::Champions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Hibernating => "hibernating",
            Segment::AtRisk => "at_risk",
            Segment::CantLoose => "cant_loose",
            Segment::AboutToSleep => "about_to_sleep",
            Segment::NeedAttention => "need_attention",
            Segment::LoyalCustomers => "loyal_customers",
            Segment::Promising => "promising",
            Segment::NewCustomers => "new_customers",
            Segment::PotentialLoyalists => "potential_loyalists",
            Segment::Champions => "champions",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Segment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Segment::ALL
            .into_iter()
            .find(|segment| segment.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("Unknown segment: {}", s))
    }
}

/// Matches score codes whose recency and frequency scores are both in the
/// listed sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRule {
    pub recency: Vec<u8>,
    pub frequency: Vec<u8>,
    pub segment: Segment,
}

impl SegmentRule {
    pub fn new(recency: &[u8], frequency: &[u8], segment: Segment) -> Self {
        Self {
            recency: recency.to_vec(),
            frequency: frequency.to_vec(),
            segment,
        }
    }

    pub fn matches(&self, code: ScoreCode) -> bool {
        self.recency.contains(&code.recency) && self.frequency.contains(&code.frequency)
    }
}

/// Ordered rule table; the first matching rule decides the segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentRules {
    rules: Vec<SegmentRule>,
}

impl Default for SegmentRules {
    fn default() -> Self {
        use Segment::*;

        Self::new(vec![
            SegmentRule::new(&[1, 2], &[1, 2], Hibernating),
            SegmentRule::new(&[1, 2], &[3, 4], AtRisk),
            SegmentRule::new(&[1, 2], &[5], CantLoose),
            SegmentRule::new(&[3], &[1, 2], AboutToSleep),
            SegmentRule::new(&[3], &[3], NeedAttention),
            SegmentRule::new(&[3, 4], &[4, 5], LoyalCustomers),
            SegmentRule::new(&[4], &[1], Promising),
            SegmentRule::new(&[5], &[1], NewCustomers),
            SegmentRule::new(&[4, 5], &[2, 3], PotentialLoyalists),
            SegmentRule::new(&[5], &[4, 5], Champions),
        ])
    }
}

impl SegmentRules {
    pub fn new(rules: Vec<SegmentRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[SegmentRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn classify(&self, code: ScoreCode) -> Result<Segment, SegmentationError> {
        self.rules
            .iter()
            .find(|rule| rule.matches(code))
            .map(|rule| rule.segment)
            .ok_or_else(|| SegmentationError::UnclassifiedCode {
                code: code.to_string(),
                customer_id: None,
            })
    }

    /// Classify a textual code such as `"55"`
    pub fn classify_str(&self, code: &str) -> Result<Segment, SegmentationError> {
        self.classify(code.parse()?)
    }

    /// Codes over `1..=num_bins` on both axes that no rule matches
    pub fn unclassified_codes(&self, num_bins: u8) -> Vec<ScoreCode> {
        (1..=num_bins)
            .flat_map(|r| (1..=num_bins).map(move |f| ScoreCode::new(r, f)))
            .filter(|&code| self.classify(code).is_err())
            .collect()
    }
}

/// A scored profile with its segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedProfile {
    pub scored: ScoredProfile,
    pub segment: Segment,
}

impl SegmentedProfile {
    pub fn customer_id(&self) -> &str {
        &self.scored.profile.customer_id
    }
}

/// Attach a segment to every scored profile, failing on the first
/// unclassifiable one.
pub fn classify_profiles(
    scored: Vec<ScoredProfile>,
    rules: &SegmentRules,
) -> Result<Vec<SegmentedProfile>, SegmentationError> {
    scored
        .into_iter()
        .map(|scored| -> Result<SegmentedProfile, SegmentationError> {
            let segment = rules.classify(scored.score_code).map_err(|err| match err {
                SegmentationError::UnclassifiedCode { code, .. } => {
                    SegmentationError::UnclassifiedCode {
                        code,
                        customer_id: Some(scored.profile.customer_id.clone()),
                    }
                }
                other => other,
            })?;
            Ok(SegmentedProfile { scored, segment })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_examples() {
        let rules = SegmentRules::default();
        assert_eq!(rules.classify_str("55").unwrap(), Segment::Champions);
        assert_eq!(rules.classify_str("11").unwrap(), Segment::Hibernating);
        assert_eq!(rules.classify_str("15").unwrap(), Segment::CantLoose);
        assert_eq!(rules.classify_str("33").unwrap(), Segment::NeedAttention);
        assert_eq!(rules.classify_str("41").unwrap(), Segment::Promising);
        assert_eq!(rules.classify_str("51").unwrap(), Segment::NewCustomers);
        assert_eq!(rules.classify_str("24").unwrap(), Segment::AtRisk);
        assert_eq!(rules.classify_str("32").unwrap(), Segment::AboutToSleep);
        assert_eq!(rules.classify_str("44").unwrap(), Segment::LoyalCustomers);
        assert_eq!(rules.classify_str("53").unwrap(), Segment::PotentialLoyalists);
    }

    #[test]
    fn test_default_table_is_total() {
        let rules = SegmentRules::default();
        assert!(rules.unclassified_codes(5).is_empty());

        let mut seen = std::collections::HashSet::new();
        for r in 1..=5 {
            for f in 1..=5 {
                let segment = rules.classify(ScoreCode::new(r, f)).unwrap();
                seen.insert(segment);
            }
        }
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_first_match_wins() {
        let rules = SegmentRules::new(vec![
            SegmentRule::new(&[5], &[5], Segment::Champions),
            SegmentRule::new(&[1, 2, 3, 4, 5], &[1, 2, 3, 4, 5], Segment::Hibernating),
        ]);
        assert_eq!(rules.classify_str("55").unwrap(), Segment::Champions);
        assert_eq!(rules.classify_str("54").unwrap(), Segment::Hibernating);

        let reversed = SegmentRules::new(rules.rules().iter().rev().cloned().collect());
        assert_eq!(reversed.classify_str("55").unwrap(), Segment::Hibernating);
    }

    #[test]
    fn test_unclassified_code() {
        let rules = SegmentRules::default();
        let err = rules.classify_str("66").unwrap_err();
        assert!(matches!(err, SegmentationError::UnclassifiedCode { ref code, .. } if code == "66"));
        assert!(rules.classify_str("5").is_err());
        assert_eq!(rules.unclassified_codes(6).len(), 11);
    }

    #[test]
    fn test_segment_labels_roundtrip() {
        for segment in Segment::ALL {
            assert_eq!(segment.as_str().parse::<Segment>().unwrap(), segment);
        }
        assert_eq!("Loyal_Customers".parse::<Segment>().unwrap(), Segment::LoyalCustomers);
        assert!("whales".parse::<Segment>().is_err());
    }
}
