//! Historical CSV adapter
//!
//! Reads a daily weather table into [`RawRecord`]s. Header names are matched
//! after trimming and case folding, so both the raw export headers
//! ("Date time", "Maximum Temperature", ...) and already normalised names
//! are accepted. Columns other than the four required ones are ignored.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument, warn};

use crate::models::RawRecord;
use crate::{Result, SkycastError};

const DATE_ALIASES: &[&str] = &["date time", "datetime", "date"];
const MAX_TEMP_ALIASES: &[&str] = &["maximum temperature", "max_temp", "max temp", "tempmax"];
const MIN_TEMP_ALIASES: &[&str] = &["minimum temperature", "min_temp", "min temp", "tempmin"];
const HUMIDITY_ALIASES: &[&str] = &["relative humidity", "humidity"];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%d-%m-%Y"];
const TIME_SUFFIXES: &[&str] = &[" %H:%M:%S", " %H:%M"];

/// Column positions of the required fields
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    max_temp: usize,
    min_temp: usize,
    humidity: usize,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let normalised: Vec<String> = headers.iter().map(normalise_header).collect();
        let find = |field: &str, aliases: &[&str]| {
            normalised
                .iter()
                .position(|header| aliases.contains(&header.as_str()))
                .ok_or_else(|| {
                    SkycastError::data(format!(
                        "missing required column '{field}' (found: {})",
                        headers.iter().collect::<Vec<_>>().join(", ")
                    ))
                })
        };

        Ok(Self {
            date: find("date", DATE_ALIASES)?,
            max_temp: find("max_temp", MAX_TEMP_ALIASES)?,
            min_temp: find("min_temp", MIN_TEMP_ALIASES)?,
            humidity: find("humidity", HUMIDITY_ALIASES)?,
        })
    }
}

/// Load a historical CSV file
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(path).map_err(|e| {
        SkycastError::data(format!("cannot open historical data {}: {e}", path.display()))
    })?;
    let records = read_records(BufReader::new(file))?;
    info!("Read {} rows from {}", records.len(), path.display());
    Ok(records)
}

/// Read historical rows from any CSV source, in file order
pub fn read_records<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(reader.headers()?)?;
    debug!(?columns, "Resolved CSV columns");

    let mut records = Vec::new();
    let mut missing_cells = 0usize;
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        // Header is line 1
        let line = index + 2;

        let date_cell = row.get(columns.date).unwrap_or_default();
        let date = parse_date(date_cell)
            .ok_or_else(|| SkycastError::data(format!("line {line}: unrecognised date '{date_cell}'")))?;

        let record = RawRecord {
            date,
            max_temp: parse_number(row.get(columns.max_temp)),
            min_temp: parse_number(row.get(columns.min_temp)),
            humidity: parse_number(row.get(columns.humidity)),
        };
        if record.complete().is_none() {
            missing_cells += 1;
        }
        records.push(record);
    }

    if missing_cells > 0 {
        warn!("{missing_cells} rows have missing or unparseable values");
    }
    Ok(records)
}

fn normalise_header(header: &str) -> String {
    header.trim().trim_start_matches('\u{feff}').to_lowercase()
}

/// Parse a calendar date, ignoring any time of day
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(value, format).ok().or_else(|| {
            TIME_SUFFIXES.iter().find_map(|suffix| {
                NaiveDateTime::parse_from_str(value, &format!("{format}{suffix}"))
                    .ok()
                    .map(|datetime| datetime.date())
            })
        })
    })
}

fn parse_number(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<f64>().ok())
}
