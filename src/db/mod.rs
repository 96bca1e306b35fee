pub mod models;
pub mod watchlist_repo;

pub use watchlist_repo::WatchlistRepo;
