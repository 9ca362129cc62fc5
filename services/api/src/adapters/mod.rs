pub mod backend;
pub mod busy;
mod records;

pub use backend::HttpBackendAdapter;
pub use busy::{BusyGuard, BusyTracker};
