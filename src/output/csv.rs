//! Default CSV line codec
//!
//! Fine (tick/second/minute) lines start with the milliseconds elapsed since
//! midnight of the entry's date; coarse (hour/daily) lines start with a full
//! `yyyyMMdd HH:mm` timestamp so they can be merged across dates. The remaining
//! fields are written as-is with CSV quoting where needed.

use crate::config::{COARSE_TIME_FORMAT, COARSE_TIME_WIDTH};
use crate::{Granularity, Record};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use csv::{Terminator, WriterBuilder};
use tracing::warn;

use super::LineCodec;

/// CSV line codec used by the CLI and as the default for library callers
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvLineCodec;

impl CsvLineCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self
    }

    fn time_field(time: &NaiveDateTime, granularity: Granularity) -> String {
        if granularity.is_coarse() {
            time.format(COARSE_TIME_FORMAT).to_string()
        } else {
            let millis = u64::from(time.num_seconds_from_midnight()) * 1000
                + u64::from(time.nanosecond() % 1_000_000_000) / 1_000_000;
            millis.to_string()
        }
    }

    fn write_fields(fields: &[String]) -> Result<String, csv::Error> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(fields)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        let mut line = String::from_utf8_lossy(&bytes).into_owned();
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(line)
    }
}

impl LineCodec for CsvLineCodec {
    fn render(&self, record: &Record, granularity: Granularity) -> String {
        let mut fields = Vec::with_capacity(record.fields.len() + 1);
        fields.push(Self::time_field(&record.time, granularity));
        fields.extend(record.fields.iter().cloned());

        match Self::write_fields(&fields) {
            Ok(line) => line,
            Err(e) => {
                // Writing into a Vec cannot fail on I/O; fall back to a plain join
                warn!(error = %e, "CSV rendering failed, joining fields without quoting");
                fields.join(",")
            }
        }
    }

    fn parse_timestamp(&self, line: &str, granularity: Granularity) -> Option<NaiveDateTime> {
        if granularity.is_coarse() {
            let prefix = line.get(..COARSE_TIME_WIDTH)?;
            NaiveDateTime::parse_from_str(prefix, COARSE_TIME_FORMAT).ok()
        } else {
            // Fine lines carry no date; anchor them to the epoch day
            let millis: i64 = line.split(',').next()?.trim().parse().ok()?;
            if !(0..86_400_000).contains(&millis) {
                return None;
            }
            NaiveDate::from_ymd_opt(1970, 1, 1)?
                .and_hms_opt(0, 0, 0)?
                .checked_add_signed(Duration::milliseconds(millis))
        }
    }
}
