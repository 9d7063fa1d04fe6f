//! Backfill command: run the bulk pipeline over local CSV exports

use super::{parse_end_time, parse_start_time, print_json, Cli, CliError, OutputFormat};
use crate::downloader::BulkHistoryPipeline;
use crate::fetcher::csv_source::CsvHistorySource;
use crate::identifier::SymbolId;
use crate::output::csv::CsvLineCodec;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the backfill command
#[derive(Parser, Debug)]
pub struct BackfillArgs {
    /// Contract identities sharing one root (repeatable)
    #[arg(long = "symbol", required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    /// Directory holding one CSV export per contract (UTC times)
    #[arg(long)]
    pub source_dir: PathBuf,

    /// Start date (YYYY-MM-DD) or RFC3339 time, UTC
    #[arg(long)]
    pub start: String,

    /// End date (YYYY-MM-DD, inclusive) or RFC3339 time, UTC
    #[arg(long)]
    pub end: String,
}

#[derive(Debug, Serialize)]
struct BackfillReport {
    symbols: usize,
    records: usize,
    archives_written: usize,
    entries_written: usize,
    lines_written: usize,
    dates_written: usize,
}

impl BackfillArgs {
    /// Execute the backfill command
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let symbols = self
            .symbols
            .iter()
            .map(|s| SymbolId::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        let start = parse_start_time(&self.start)?;
        let end = parse_end_time(&self.end)?;

        let source = CsvHistorySource::new(self.source_dir.clone());
        let pipeline = BulkHistoryPipeline::new(cli.settings(), CsvLineCodec::new());
        let summary = pipeline.download_and_save(&source, &symbols, start, end)?;

        let report = BackfillReport {
            symbols: summary.symbols,
            records: summary.records,
            archives_written: summary.archives_written,
            entries_written: summary.entries_written,
            lines_written: summary.lines_written,
            dates_written: summary.dates_written,
        };

        match cli.output_format {
            OutputFormat::Json => print_json(&report)?,
            OutputFormat::Human => {
                println!("Backfill complete");
                println!("  Symbols: {}", report.symbols);
                println!("  Records: {}", report.records);
                println!("  Archives written: {}", report.archives_written);
                println!("  Entries written: {}", report.entries_written);
                if cli.granularity.is_coarse() {
                    println!("  Lines written: {}", report.lines_written);
                } else {
                    println!("  Dates written: {}", report.dates_written);
                }
            }
        }
        Ok(())
    }
}
