pub mod connectivity;

pub use connectivity::{ConnectivityMonitor, StatusCallback};
