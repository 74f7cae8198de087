//! Price-history providers.

pub mod csv_file;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use csv_file::{read_series_csv, read_series_csv_file, write_series_csv, CsvProvider};
pub use provider::{DataError, DataSource, PriceHistoryProvider};
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;
