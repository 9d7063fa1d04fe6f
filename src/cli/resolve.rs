//! Resolve command: show where a symbol's data for a date is stored

use super::{parse_date, print_json, Cli, CliError, OutputFormat};
use crate::identifier::SymbolId;
use crate::output::path::{self, StorageMode};
use clap::Parser;
use serde::Serialize;

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Symbol identity (e.g., FUTURE:CME:ES:2020-03-20)
    #[arg(long)]
    pub symbol: String,

    /// Date (YYYY-MM-DD); ignored for hour and daily granularity
    #[arg(long)]
    pub date: String,
}

#[derive(Debug, Serialize)]
struct ResolveReport {
    archive: String,
    entry: String,
    storage_mode: &'static str,
}

fn mode_name(mode: StorageMode) -> &'static str {
    match mode {
        StorageMode::CoarseMergeable => "coarse-mergeable",
        StorageMode::AppendMergeable => "append-mergeable",
        StorageMode::ReplaceOnly => "replace-only",
    }
}

impl ResolveArgs {
    /// Execute the resolve command
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let symbol = SymbolId::parse(&self.symbol)?;
        let date = parse_date(&self.date)?;
        let time = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| CliError::InvalidArgument(format!("Invalid date: {date}")))?;

        let location = path::resolve(&cli.data_dir, &symbol, time, cli.granularity, cli.kind)?;
        let mode = StorageMode::lookup(symbol.category(), cli.granularity)?;

        let report = ResolveReport {
            archive: location.file.display().to_string(),
            entry: location.entry,
            storage_mode: mode_name(mode),
        };

        match cli.output_format {
            OutputFormat::Json => print_json(&report)?,
            OutputFormat::Human => {
                println!("Archive: {}", report.archive);
                println!("Entry: {}", report.entry);
                println!("Storage mode: {}", report.storage_mode);
            }
        }
        Ok(())
    }
}
