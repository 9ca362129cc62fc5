//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::BusyTracker;
use crate::config::Config;
use case_desk_core::CaseFlow;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// Nothing about a case is cached here: every request reads through to the
/// backend.
#[derive(Clone)]
pub struct AppState {
    pub flow: CaseFlow,
    /// The same tracker the backend adapter counts its calls on.
    pub busy: BusyTracker,
    pub config: Arc<Config>,
}
