//! Per-table orchestration: the coordinator task, the outbound event sink,
//! and the disconnect supervisor.

mod broadcast;
mod coordinator;
mod disconnect;

#[cfg(test)]
mod tests;

pub use broadcast::EventSink;
pub use coordinator::{Table, TableCoordinator};
pub use disconnect::DisconnectSupervisor;
