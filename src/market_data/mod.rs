pub mod catalog;
pub mod history_cache;
pub mod service;

pub use service::MarketDataService;
