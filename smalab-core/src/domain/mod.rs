//! Domain types for SmaLab

pub mod bar;
pub mod series;
pub mod snapshot;
pub mod trade;

pub use bar::PriceBar;
pub use series::{PriceSeries, SeriesError};
pub use snapshot::PositionSnapshot;
pub use trade::{round_trips, RoundTrip, Trade, TradeSide};
