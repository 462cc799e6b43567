//! Deterministic, pure logic behind the admission gate.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures (the session state, parsed requests, observations gathered
//! by `io`) and return deterministic outputs suitable for tests.

pub mod branch;
pub mod classifier;
pub mod command_sets;
pub mod decision;
pub mod paths;
pub mod plan_guard;
pub mod triggers;
pub mod types;
pub mod workflow;
