//! Command-line interface definitions and argument parsing

use chrono::NaiveDate;
use clap::Parser;

use crate::config::SegmentationConfig;
use crate::segment::Segment;

/// Customer segmentation CLI using RFM quantile scoring
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input ledger CSV file
    #[arg(short, long, default_value = "data.csv")]
    pub input: String,

    /// Optional TOML file with segmentation settings
    #[arg(short, long)]
    pub config: Option<String>,

    /// Reference date for recency, as YYYY-MM-DD (overrides the config file)
    #[arg(short, long)]
    pub reference_date: Option<String>,

    /// Substring marking cancelled invoices (overrides the config file)
    #[arg(long)]
    pub cancellation_marker: Option<String>,

    /// Quantile bins per score axis (overrides the config file)
    #[arg(short, long)]
    pub bins: Option<usize>,

    /// Write the segmented customer table to this CSV file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Export the customer ids of one segment, e.g. "loyal_customers"
    #[arg(short, long)]
    pub export_segment: Option<String>,

    /// Destination for --export-segment
    #[arg(long, default_value = "segment_customers.csv")]
    pub segment_output: String,

    /// Write a markdown report to this file
    #[arg(long)]
    pub report: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the reference date override
    /// Expected format: "YYYY-MM-DD"
    pub fn parse_reference_date(&self) -> crate::Result<Option<NaiveDate>> {
        self.reference_date
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .map_err(|_| anyhow::anyhow!("Invalid reference date: {}", raw))
            })
            .transpose()
    }

    /// Parse the segment selected for export
    pub fn parse_export_segment(&self) -> crate::Result<Option<Segment>> {
        self.export_segment.as_deref().map(str::parse).transpose()
    }

    /// Load the config file (or defaults) and apply command-line overrides
    pub fn resolve_config(&self) -> crate::Result<SegmentationConfig> {
        let mut config = match &self.config {
            Some(path) => SegmentationConfig::from_file(path)?,
            None => SegmentationConfig::default(),
        };

        if let Some(date) = self.parse_reference_date()? {
            config.reference_date = date;
        }
        if let Some(marker) = &self.cancellation_marker {
            config.cancellation_marker = marker.clone();
        }
        if let Some(bins) = self.bins {
            config.num_bins = bins;
        }

        config.validate()?;
        Ok(config)
    }
}
