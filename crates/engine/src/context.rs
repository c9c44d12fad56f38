//! Request context threaded through every mutating call.
//!
//! The acting identity is an explicit parameter, never ambient process
//! state: who may validate what is decided by an authorization collaborator
//! upstream, and the engine records who acted.

use stockflow_core::ActorId;

/// Immutable per-request context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestContext {
    actor: ActorId,
}

impl RequestContext {
    pub fn new(actor: ActorId) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }
}
