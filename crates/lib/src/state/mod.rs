//! Persisted pipeline state.
//!
//! The state file records which stages have completed and which parameters
//! have been resolved, so an interrupted or failed run resumes where it left
//! off. It is read once at the start of a run and written once at the end.

mod store;
mod types;

pub use store::StateStore;
pub use types::{PipelineState, StateError, keys};
