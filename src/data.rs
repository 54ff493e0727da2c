//! Ledger loading and the record filter

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::SegmentationError;

/// Column names of the ledger frame
pub const INVOICE_ID: &str = "invoice_id";
pub const QUANTITY: &str = "quantity";
pub const INVOICE_TS: &str = "invoice_ts";
pub const UNIT_PRICE: &str = "unit_price";
pub const CUSTOMER_ID: &str = "customer_id";
/// `quantity * unit_price`, added by the filter
pub const LINE_TOTAL: &str = "line_total";

/// Timestamp layouts accepted in the `InvoiceDate` column, tried in order
/// after RFC 3339.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

/// One raw line item of the sales ledger. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransactionLine {
    #[serde(rename = "InvoiceNo", alias = "Invoice", default)]
    pub invoice_id: Option<String>,
    #[serde(rename = "StockCode", default)]
    pub stock_code: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Quantity", default, deserialize_with = "csv::invalid_option")]
    pub quantity: Option<i64>,
    #[serde(rename = "InvoiceDate", default, deserialize_with = "lenient_timestamp")]
    pub invoice_date: Option<NaiveDateTime>,
    #[serde(
        rename = "UnitPrice",
        alias = "Price",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pub unit_price: Option<f64>,
    #[serde(rename = "CustomerID", alias = "Customer ID", default)]
    pub customer_id: Option<String>,
    #[serde(rename = "Country", default)]
    pub country: Option<String>,
}

/// Why lines were dropped by [`filter_lines_with_stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub kept: usize,
    pub missing_fields: usize,
    pub cancelled: usize,
    pub non_positive: usize,
}

impl FilterStats {
    pub fn dropped(&self) -> usize {
        self.missing_fields + self.cancelled + self.non_positive
    }
}

/// Load the ledger from a CSV file with a header row.
///
/// Unparseable numbers and timestamps are read as missing so the filter can
/// discard them; structural CSV errors abort the load.
pub fn load_transactions<P: AsRef<Path>>(path: P) -> crate::Result<Vec<TransactionLine>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open ledger {}", path.display()))?;

    let mut lines = Vec::new();
    for (index, record) in reader.deserialize::<TransactionLine>().enumerate() {
        let line = record.with_context(|| {
            format!("malformed ledger row {} in {}", index + 2, path.display())
        })?;
        lines.push(line);
    }

    debug!(rows = lines.len(), path = %path.display(), "ledger loaded");
    Ok(lines)
}

/// Build the ledger frame the filter and aggregator work on.
///
/// Blank ids and non-finite prices become nulls; timestamps are stored as
/// microseconds since the epoch.
pub fn transactions_frame(lines: &[TransactionLine]) -> PolarsResult<DataFrame> {
    let text = |field: fn(&TransactionLine) -> &Option<String>| -> Vec<Option<String>> {
        lines
            .iter()
            .map(|line| non_blank(field(line)).map(str::to_string))
            .collect()
    };

    let quantity: Vec<Option<i64>> = lines.iter().map(|l| l.quantity).collect();
    let unit_price: Vec<Option<f64>> = lines
        .iter()
        .map(|l| l.unit_price.filter(|p| p.is_finite()))
        .collect();
    let invoice_ts: Vec<Option<i64>> = lines
        .iter()
        .map(|l| l.invoice_date.map(|t| t.and_utc().timestamp_micros()))
        .collect();

    df!(
        INVOICE_ID => text(|l| &l.invoice_id),
        "stock_code" => text(|l| &l.stock_code),
        "description" => text(|l| &l.description),
        QUANTITY => quantity,
        INVOICE_TS => invoice_ts,
        UNIT_PRICE => unit_price,
        CUSTOMER_ID => text(|l| &l.customer_id),
        "country" => text(|l| &l.country)
    )
}

/// Drop missing, cancelled and non-positive lines and derive `line_total`.
///
/// The result keeps the ledger columns of [`transactions_frame`] plus
/// [`LINE_TOTAL`], in input order.
pub fn filter_lines(
    lines: &[TransactionLine],
    cancellation_marker: &str,
) -> Result<DataFrame, SegmentationError> {
    Ok(filter_lines_with_stats(lines, cancellation_marker)?.0)
}

/// Same as [`filter_lines`], also reporting why lines were dropped.
pub fn filter_lines_with_stats(
    lines: &[TransactionLine],
    cancellation_marker: &str,
) -> Result<(DataFrame, FilterStats), SegmentationError> {
    let df = transactions_frame(lines)?;

    let missing = [INVOICE_ID, CUSTOMER_ID, QUANTITY, UNIT_PRICE, INVOICE_TS]
        .into_iter()
        .map(|name| col(name).is_null())
        .reduce(|a, b| a.or(b))
        .unwrap_or(lit(false));
    // an empty marker cancels nothing
    let cancelled = if cancellation_marker.is_empty() {
        lit(false)
    } else {
        col(INVOICE_ID)
            .str()
            .contains_literal(lit(cancellation_marker.to_string()))
    };
    let non_positive = col(QUANTITY)
        .lt_eq(lit(0))
        .or(col(UNIT_PRICE).lt_eq(lit(0.0)));

    let counts = df
        .clone()
        .lazy()
        .select([
            missing.clone().cast(DataType::Int64).sum().alias("missing"),
            missing
                .clone()
                .not()
                .and(cancelled.clone())
                .cast(DataType::Int64)
                .sum()
                .alias("cancelled"),
            missing
                .clone()
                .not()
                .and(cancelled.clone().not())
                .and(non_positive.clone())
                .cast(DataType::Int64)
                .sum()
                .alias("non_positive"),
        ])
        .collect()?;

    let filtered = df
        .lazy()
        .filter(missing.not().and(cancelled.not()).and(non_positive.not()))
        .with_columns([(col(QUANTITY).cast(DataType::Float64) * col(UNIT_PRICE)).alias(LINE_TOTAL)])
        .collect()?;

    let count = |name: &str| -> PolarsResult<usize> {
        Ok(counts.column(name)?.i64()?.get(0).unwrap_or(0) as usize)
    };
    let stats = FilterStats {
        kept: filtered.height(),
        missing_fields: count("missing")?,
        cancelled: count("cancelled")?,
        non_positive: count("non_positive")?,
    };

    debug!(
        kept = stats.kept,
        missing = stats.missing_fields,
        cancelled = stats.cancelled,
        non_positive = stats.non_positive,
        "record filter finished"
    );
    Ok((filtered, stats))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a ledger timestamp in any of the accepted layouts
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}
