//! Side-effecting adapters: project files, git, child processes.

pub mod config;
pub mod events;
pub mod git;
pub mod layout;
pub mod process;
pub mod state_store;
pub mod subagent;
