pub mod manager;
pub mod symbol;

pub use manager::WatchlistManager;
