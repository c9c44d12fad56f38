//! Observability wiring for stockflow processes.

pub mod tracing;

pub use tracing::{init, init_with_filter};
