//! Application layer: the saga steps and the orchestrator sequencing them.
//!
//! Each step owns a handle to the provider and a per-call timeout. The
//! `Orchestrator` runs the steps in order over one cohort and turns the first
//! failure into an aborted `SagaReport`.

pub mod authorization;
pub mod enrollment;
pub mod orchestrator;
mod remote;
pub mod settlement;
