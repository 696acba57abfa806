//! Service layer
//!
//! The orchestration core of the scheduler: the run registry that enforces
//! at most one active run per site, and the dispatcher that resolves
//! handlers and launches runs.

mod dispatcher;
mod run_registry;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{DispatchError, DispatchOutcome, DispatchSettings, Dispatcher};
pub use run_registry::RunRegistry;
