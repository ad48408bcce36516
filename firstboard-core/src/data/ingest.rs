//! CSV ingestion for recorded sessions.
//!
//! Formats (header row required):
//! - daily bars: `symbol,date,open,high,low,close,volume`
//! - ticks: `symbol,timestamp,price` with `%Y-%m-%d %H:%M[:%S]` timestamps
//! - candidates: `date,symbol`

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use super::provider::{DataError, StaticCandidates};
use crate::domain::{DailyBar, Tick};

#[derive(Debug, Deserialize)]
struct TickRow {
    symbol: String,
    timestamp: String,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct CandidateRow {
    date: NaiveDate,
    symbol: String,
}

fn open_file(path: &Path) -> Result<std::fs::File, DataError> {
    std::fs::File::open(path).map_err(|e| DataError::Io(format!("{}: {e}", path.display())))
}

fn csv_err(e: csv::Error) -> DataError {
    DataError::Parse(e.to_string())
}

/// Read daily bars. Insane bars are rejected rather than silently kept.
pub fn read_daily_bars<R: Read>(reader: R) -> Result<Vec<DailyBar>, DataError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();
    for row in rdr.deserialize::<DailyBar>() {
        let bar = row.map_err(csv_err)?;
        if !bar.is_sane() {
            return Err(DataError::Parse(format!(
                "insane bar for {} on {}",
                bar.symbol, bar.date
            )));
        }
        bars.push(bar);
    }
    Ok(bars)
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DataError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .map_err(|e| DataError::Parse(format!("timestamp '{raw}': {e}")))
}

pub fn read_ticks<R: Read>(reader: R) -> Result<Vec<Tick>, DataError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut ticks = Vec::new();
    for row in rdr.deserialize::<TickRow>() {
        let row = row.map_err(csv_err)?;
        if !(row.price > 0.0) {
            return Err(DataError::Parse(format!(
                "non-positive price for {} at {}",
                row.symbol, row.timestamp
            )));
        }
        ticks.push(Tick {
            timestamp: parse_timestamp(&row.timestamp)?,
            symbol: row.symbol,
            price: row.price,
        });
    }
    Ok(ticks)
}

pub fn read_candidates<R: Read>(reader: R) -> Result<StaticCandidates, DataError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = StaticCandidates::new();
    for row in rdr.deserialize::<CandidateRow>() {
        let row = row.map_err(csv_err)?;
        out.push(row.date, row.symbol);
    }
    Ok(out)
}

pub fn load_daily_bars(path: &Path) -> Result<Vec<DailyBar>, DataError> {
    read_daily_bars(open_file(path)?)
}

pub fn load_ticks(path: &Path) -> Result<Vec<Tick>, DataError> {
    read_ticks(open_file(path)?)
}

pub fn load_candidates(path: &Path) -> Result<StaticCandidates, DataError> {
    read_candidates(open_file(path)?)
}
