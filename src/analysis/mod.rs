pub mod trend;

pub use trend::{classify_candles, classify_trend};
