//! rfmforge: RFM customer segmentation CLI
//!
//! This is the main entrypoint that wires the ledger loader, the
//! segmentation pipeline and the exporters together.

use anyhow::Result;
use clap::Parser;
use rfmforge::{
    customers_in_segment, export, load_transactions, logging, report, segment_customers,
    summarize_segments, Args,
};
use std::time::Instant;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    logging::init_logging(args.verbose);

    let config = args.resolve_config()?;
    let export_segment = args.parse_export_segment()?;

    if args.verbose {
        println!("rfmforge - RFM Customer Segmentation");
        println!("====================================\n");
        println!("Reference date: {}", config.reference_date);
        println!("Cancellation marker: {:?}", config.cancellation_marker);
        println!("Bins per axis: {}\n", config.num_bins);
    }

    let start_time = Instant::now();

    // Step 1: Load the ledger
    let load_start = Instant::now();
    let lines = load_transactions(&args.input)?;
    println!("✓ Ledger loaded: {} transaction lines", lines.len());
    if args.verbose {
        println!("  Loading time: {:.2}s", load_start.elapsed().as_secs_f64());
    }

    // Step 2: Filter, aggregate, score and classify
    let segment_start = Instant::now();
    let profiles = segment_customers(&lines, &config)?;
    println!("✓ Customers segmented: {}", profiles.len());
    if args.verbose {
        println!(
            "  Segmentation time: {:.2}s",
            segment_start.elapsed().as_secs_f64()
        );
    }

    // Step 3: Segment statistics
    println!("\n=== Segment Statistics ===");
    let summaries = summarize_segments(&profiles);
    print!("{}", report::format_summary_table(&summaries));

    // Step 4: Outputs
    if let Some(path) = &args.output {
        export::write_profiles(path, &profiles)?;
        println!("\nSegmented customers saved to: {}", path);
    }

    if let Some(segment) = export_segment {
        let ids = customers_in_segment(&profiles, segment);
        export::write_customer_ids(&args.segment_output, &ids)?;
        println!(
            "{} {} customers saved to: {}",
            ids.len(),
            segment,
            args.segment_output
        );
    }

    if let Some(path) = &args.report {
        std::fs::write(path, report::build_report(config.reference_date, &profiles))?;
        println!("Report written to: {}", path);
    }

    println!("\n=== Pipeline Complete ===");
    println!(
        "Total processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
