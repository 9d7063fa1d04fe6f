//! Import command: stream a local CSV file through the streaming writer

use super::{print_json, Cli, CliError, OutputFormat};
use crate::fetcher::csv_source::read_local_records;
use crate::identifier::SymbolId;
use crate::output::csv::CsvLineCodec;
use crate::output::StreamingWriter;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the import command
#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Symbol identity (e.g., EQUITY:USA:AAPL)
    #[arg(long)]
    pub symbol: String,

    /// CSV file with the time in the first column, sorted by time
    #[arg(long)]
    pub input: PathBuf,
}

#[derive(Debug, Serialize)]
struct ImportReport {
    symbol: String,
    input: String,
    records: usize,
    archives_written: usize,
    lines_written: usize,
}

impl ImportArgs {
    /// Execute the import command
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let symbol = SymbolId::parse(&self.symbol)?;
        let settings = cli.settings();

        let records = read_local_records(&self.input, settings.timezone)?;
        info!(
            symbol = %symbol,
            input = %self.input.display(),
            records = records.len(),
            "Importing records"
        );

        let mut writer = StreamingWriter::new(symbol.clone(), settings, CsvLineCodec::new())?;
        let summary = writer.write(records)?;

        let report = ImportReport {
            symbol: symbol.to_string(),
            input: self.input.display().to_string(),
            records: summary.records,
            archives_written: summary.archives_written,
            lines_written: summary.lines_written,
        };

        match cli.output_format {
            OutputFormat::Json => print_json(&report)?,
            OutputFormat::Human => {
                println!("Import complete: {}", report.symbol);
                println!("  Records: {}", report.records);
                println!("  Archives written: {}", report.archives_written);
                println!("  Lines written: {}", report.lines_written);
            }
        }
        Ok(())
    }
}
