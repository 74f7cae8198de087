//! CSV price files.
//!
//! Accepts the layouts common market-data exports use: a date column (named
//! `date`, `datetime` or `timestamp`, otherwise the first column) plus
//! case-insensitive `open`, `high`, `low`, `close`, `volume`. Only `close` is
//! required. Rows may arrive in any order; duplicate dates are rejected.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use super::provider::{non_empty, DataError, DataSource, PriceHistoryProvider};
use crate::domain::{PriceBar, PriceSeries};

/// Reads `<dir>/<SYMBOL>.csv`, or a single fixed file.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    location: PathBuf,
}

impl CsvProvider {
    /// `location` may be a directory of `<SYMBOL>.csv` files or one file.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        if self.location.is_dir() {
            self.location.join(format!("{symbol}.csv"))
        } else {
            self.location.clone()
        }
    }
}

impl PriceHistoryProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn source(&self) -> DataSource {
        DataSource::Csv
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        let path = self.path_for(symbol);
        debug!(path = %path.display(), symbol, "reading csv");
        let series = read_series_csv_file(&path, symbol)?;
        non_empty(series.slice_dates(start, end), start, end)
    }
}

pub fn read_series_csv_file(path: &Path, symbol: &str) -> Result<PriceSeries, DataError> {
    let file = File::open(path)?;
    read_series_csv(file, symbol)
}

/// Column positions resolved from the header row.
struct Columns {
    date: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, DataError> {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |name: &str| normalized.iter().position(|h| h == name);

        let close = find("close").ok_or_else(|| DataError::MissingColumn("close".into()))?;
        let open = find("open");
        let high = find("high");
        let low = find("low");
        let volume = find("volume");

        // An unnamed first column is taken as the date index, unless it is
        // already one of the price columns.
        let date = match find("date")
            .or_else(|| find("datetime"))
            .or_else(|| find("timestamp"))
        {
            Some(idx) => idx,
            None if ![Some(close), open, high, low, volume].contains(&Some(0)) => 0,
            None => return Err(DataError::MissingColumn("date".into())),
        };

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Parse a CSV document into a sorted series.
pub fn read_series_csv<R: Read>(reader: R, symbol: &str) -> Result<PriceSeries, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let columns = Columns::resolve(rdr.headers()?)?;

    let mut bars = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let row = i + 2;
        let field = |idx: usize| record.get(idx).map(str::trim).filter(|s| !s.is_empty());

        let date_str = field(columns.date).ok_or_else(|| DataError::Parse {
            row,
            message: "missing date".into(),
        })?;
        let date = parse_date(date_str).ok_or_else(|| DataError::Parse {
            row,
            message: format!("unrecognised date '{date_str}'"),
        })?;

        let close = match field(columns.close) {
            Some(raw) => parse_f64(raw, row, "close")?,
            None => {
                return Err(DataError::MissingClose {
                    symbol: symbol.to_string(),
                    date,
                })
            }
        };

        let optional = |idx: Option<usize>, name: &str| -> Result<Option<f64>, DataError> {
            idx.and_then(field)
                .map(|raw| parse_f64(raw, row, name))
                .transpose()
        };

        bars.push(PriceBar {
            date,
            close,
            open: optional(columns.open, "open")?,
            high: optional(columns.high, "high")?,
            low: optional(columns.low, "low")?,
            // Volumes are sometimes exported as floats ("1200.0").
            volume: optional(columns.volume, "volume")?.map(|v| v.max(0.0).round() as u64),
        });
    }

    Ok(PriceSeries::from_unsorted(symbol, bars)?)
}

fn parse_f64(raw: &str, row: usize, column: &str) -> Result<f64, DataError> {
    raw.parse::<f64>().map_err(|e| DataError::Parse {
        row,
        message: format!("{column} '{raw}': {e}"),
    })
}

/// `YYYY-MM-DD`, optionally followed by a time part (`2024-01-02 00:00:00`,
/// `2024-01-02T00:00:00-05:00`).
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// Write a series in the layout [`read_series_csv`] reads back.
pub fn write_series_csv<W: Write>(series: &PriceSeries, writer: W) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["date", "open", "high", "low", "close", "volume"])?;
    let opt = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
    for bar in series.bars() {
        wtr.write_record([
            bar.date.to_string(),
            opt(bar.open),
            opt(bar.high),
            opt(bar.low),
            format!("{:.6}", bar.close),
            bar.volume.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
