//! Customer aggregation: one recency/frequency/monetary profile per customer

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use tracing::{info, warn};

use crate::data::{CUSTOMER_ID, INVOICE_ID, INVOICE_TS, LINE_TOTAL};
use crate::error::SegmentationError;

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Behavioral profile of a single customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    pub customer_id: String,
    /// Whole days between the reference date and the last purchase
    pub recency: i64,
    /// Distinct invoices
    pub frequency: usize,
    /// Sum of line totals
    pub monetary: f64,
    pub last_purchase: NaiveDateTime,
}

/// Group filtered lines by customer and compute their RFM metrics.
///
/// `lines` is the frame produced by [`crate::data::filter_lines`]. `today` is
/// taken at midnight and recency is floored to whole days, so a purchase
/// any time after midnight of the reference date has recency -1.
///
/// Profiles come back sorted by customer id so that later rank tie-breaks
/// are reproducible. Ids are compared as strings: `"10000"` sorts before
/// `"9999"`.
pub fn aggregate(
    lines: &DataFrame,
    today: NaiveDate,
) -> Result<Vec<CustomerProfile>, SegmentationError> {
    if lines.height() == 0 {
        return Err(SegmentationError::Aggregation {
            total_lines: 0,
            filtered_lines: 0,
        });
    }

    let reference = today.and_time(NaiveTime::MIN).and_utc().timestamp_micros();

    let rfm_df = lines
        .clone()
        .lazy()
        .group_by([col(CUSTOMER_ID)])
        .agg([
            col(INVOICE_TS).max().alias("last_purchase"),
            col(INVOICE_ID)
                .n_unique()
                .cast(DataType::Int64)
                .alias("frequency"),
            col(LINE_TOTAL).sum().alias("monetary"),
        ])
        .with_columns([(lit(reference) - col("last_purchase"))
            .floor_div(lit(MICROS_PER_DAY))
            .cast(DataType::Int64)
            .alias("recency")])
        .sort([CUSTOMER_ID], SortMultipleOptions::default())
        .collect()?;

    let customer_ids = rfm_df.column(CUSTOMER_ID)?.str()?;
    let last_purchases = rfm_df.column("last_purchase")?.i64()?;
    let recencies = rfm_df.column("recency")?.i64()?;
    let frequencies = rfm_df.column("frequency")?.i64()?;
    let monetaries = rfm_df.column("monetary")?.f64()?;

    let mut profiles = Vec::with_capacity(rfm_df.height());
    for ((((customer_id, last), recency), frequency), monetary) in customer_ids
        .into_no_null_iter()
        .zip(last_purchases.into_no_null_iter())
        .zip(recencies.into_no_null_iter())
        .zip(frequencies.into_no_null_iter())
        .zip(monetaries.into_no_null_iter())
    {
        let last_purchase = DateTime::from_timestamp_micros(last)
            .map(|t| t.naive_utc())
            .ok_or_else(|| {
                SegmentationError::Frame(format!(
                    "last purchase of customer {customer_id} is out of range"
                ))
            })?;

        profiles.push(CustomerProfile {
            customer_id: customer_id.to_string(),
            recency,
            frequency: frequency as usize,
            monetary,
            last_purchase,
        });
    }

    let non_positive_recency = profiles.iter().filter(|p| p.recency <= 0).count();
    if non_positive_recency > 0 {
        warn!(
            customers = non_positive_recency,
            reference_date = %today,
            "purchases on or after the reference date produce non-positive recency"
        );
    }

    info!(
        lines = lines.height(),
        customers = profiles.len(),
        "aggregated customer profiles"
    );
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{filter_lines, parse_timestamp, TransactionLine};

    fn line(customer: &str, invoice: &str, quantity: i64, price: f64, at: &str) -> TransactionLine {
        TransactionLine {
            invoice_id: Some(invoice.to_string()),
            stock_code: None,
            description: None,
            quantity: Some(quantity),
            invoice_date: parse_timestamp(at),
            unit_price: Some(price),
            customer_id: Some(customer.to_string()),
            country: None,
        }
    }

    fn filtered(lines: &[TransactionLine]) -> DataFrame {
        filter_lines(lines, "C").unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2011, 12, 11).unwrap()
    }

    #[test]
    fn test_aggregate_single_customer() {
        let lines = filtered(&[
            line("C1", "100", 2, 5.0, "2011-12-01 10:00:00"),
            line("C1", "100", 3, 2.0, "2011-12-01 10:00:00"),
            line("C1", "101", 1, 10.0, "2011-12-05 16:30:00"),
        ]);

        let profiles = aggregate(&lines, today()).unwrap();
        assert_eq!(profiles.len(), 1);

        let profile = &profiles[0];
        assert_eq!(profile.customer_id, "C1");
        assert_eq!(profile.frequency, 2);
        assert!((profile.monetary - 26.0).abs() < 1e-9);
        // 5 days 7.5 hours floors to 5
        assert_eq!(profile.recency, 5);
        assert_eq!(profile.last_purchase, parse_timestamp("2011-12-05 16:30:00").unwrap());
    }

    #[test]
    fn test_aggregate_sorts_by_customer() {
        let lines = filtered(&[
            line("17850", "536365", 6, 2.55, "2010-12-01 08:26:00"),
            line("12346", "541431", 1, 1.04, "2011-01-18 10:01:00"),
            line("13047", "536367", 8, 2.75, "2010-12-01 08:34:00"),
        ]);

        let profiles = aggregate(&lines, today()).unwrap();
        let ids: Vec<&str> = profiles.iter().map(|p| p.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["12346", "13047", "17850"]);

        for profile in &profiles {
            assert!(profile.frequency >= 1);
            assert!(profile.monetary >= 0.0);
        }
    }

    #[test]
    fn test_customer_ids_sort_as_strings() {
        let lines = filtered(&[
            line("9999", "1", 1, 1.0, "2011-06-01 10:00:00"),
            line("10000", "2", 1, 1.0, "2011-06-01 10:00:00"),
        ]);

        let profiles = aggregate(&lines, today()).unwrap();
        let ids: Vec<&str> = profiles.iter().map(|p| p.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["10000", "9999"]);
    }

    #[test]
    fn test_recency_on_or_after_reference_date() {
        let lines = filtered(&[
            line("A", "1", 1, 1.0, "2011-12-11 09:00:00"),
            line("B", "2", 1, 1.0, "2011-12-12 09:00:00"),
        ]);

        let profiles = aggregate(&lines, today()).unwrap();
        // floor, not truncation: -9 hours is day -1
        assert_eq!(profiles[0].recency, -1);
        assert_eq!(profiles[1].recency, -2);
    }

    #[test]
    fn test_recency_floors_sub_second_offsets() {
        let lines = filtered(&[
            line("A", "1", 1, 1.0, "2011-12-11T00:00:00.500Z"),
            line("B", "2", 1, 1.0, "2011-12-10T23:59:59.999Z"),
            line("C", "3", 1, 1.0, "2011-12-11T00:00:00Z"),
        ]);

        let profiles = aggregate(&lines, today()).unwrap();
        let recency: Vec<i64> = profiles.iter().map(|p| p.recency).collect();
        assert_eq!(recency, vec![-1, 0, 0]);
    }

    #[test]
    fn test_recency_floors_whole_days() {
        let lines = filtered(&[
            line("A", "1", 1, 1.0, "2011-12-09 23:59:00"),
            line("B", "2", 1, 1.0, "2011-12-12 00:00:01"),
        ]);

        let profiles = aggregate(&lines, today()).unwrap();
        assert_eq!(profiles[0].recency, 1);
        assert_eq!(profiles[1].recency, -2);
    }

    #[test]
    fn test_aggregate_empty_input() {
        let lines = filtered(&[line("A", "C1", 1, 1.0, "2011-12-01 10:00:00")]);
        let result = aggregate(&lines, today());
        assert!(matches!(result, Err(SegmentationError::Aggregation { .. })));
    }
}
