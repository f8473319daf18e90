//! Bidirectional sync between the local replica and the remote service.
//!
//! [`SyncEngine`] runs one cycle against a [`RemoteGateway`](crate::remote::RemoteGateway).
//! The [`Orchestrator`] runs cycles on a background task driven by [`SyncCommand`]s.

mod connectivity;
mod engine;
mod local;
mod orchestrator;
mod protocol;
mod resolver;
mod scheduler;
#[cfg(test)]
mod testing;

pub use connectivity::{Connectivity, SharedConnectivity};
pub use engine::{CycleReport, PullReport, PushReport, ReconcileReport, SyncEngine};
pub use local::LocalStore;
pub use orchestrator::{spawn, Orchestrator, OrchestratorHandle, OrchestratorState};
pub use protocol::{SyncCommand, SyncEvent, SyncTarget};
pub use resolver::{resolve, Resolution};
pub use scheduler::Scheduler;
