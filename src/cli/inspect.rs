//! Inspect command: list or print archive entries

use super::{print_json, Cli, CliError, OutputFormat};
use crate::output::ArchiveFile;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Archive file to read
    #[arg(long)]
    pub archive: PathBuf,

    /// Print the content of this entry instead of listing entries
    #[arg(long)]
    pub entry: Option<String>,
}

#[derive(Debug, Serialize)]
struct EntrySummary {
    name: String,
    bytes: usize,
    lines: usize,
    first: Option<String>,
    last: Option<String>,
}

impl EntrySummary {
    fn new(name: &str, content: &[u8]) -> Self {
        let text = String::from_utf8_lossy(content);
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let leading = |line: &&str| line.split(',').next().unwrap_or_default().to_string();

        Self {
            name: name.to_string(),
            bytes: content.len(),
            lines: lines.len(),
            first: lines.first().map(leading),
            last: lines.last().map(leading),
        }
    }
}

impl InspectArgs {
    /// Execute the inspect command
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let archive = ArchiveFile::open(&self.archive)?.ok_or_else(|| {
            CliError::InvalidArgument(format!("archive not found: {}", self.archive.display()))
        })?;

        if let Some(name) = &self.entry {
            let content = archive.entry(name).ok_or_else(|| {
                CliError::InvalidArgument(format!(
                    "entry {name} not found in {}",
                    self.archive.display()
                ))
            })?;
            println!("{}", String::from_utf8_lossy(content));
            return Ok(());
        }

        let entries: Vec<EntrySummary> = archive
            .entry_names()
            .filter_map(|name| archive.entry(name).map(|c| EntrySummary::new(name, c)))
            .collect();

        match cli.output_format {
            OutputFormat::Json => print_json(&entries)?,
            OutputFormat::Human => {
                println!("{} ({} entries)", self.archive.display(), entries.len());
                for entry in &entries {
                    println!(
                        "  {}  {} lines  {} bytes  [{} .. {}]",
                        entry.name,
                        entry.lines,
                        entry.bytes,
                        entry.first.as_deref().unwrap_or("-"),
                        entry.last.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Ok(())
    }
}
