//! Workflow admission gate for coding-agent tool calls.
//!
//! Every tool request the agent makes is checked against the session's
//! workflow mode (Discussion, Implementation, Plan), the agreed plan, the
//! active task's branch, and the delegation boundary. The architecture keeps
//! a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (classification, transitions,
//!   plan and branch checks, decisions). No I/O.
//! - **[`io`]**: Side-effecting adapters (state and config files, audit log,
//!   git, child processes, subagent markers).
//!
//! Orchestration modules ([`gate`], [`prompt`], [`post_tool`]) combine the two
//! to implement the hook commands of the `gate` binary.

pub mod core;
pub mod exit_codes;
pub mod gate;
pub mod hook;
pub mod io;
pub mod logging;
pub mod messages;
pub mod post_tool;
pub mod prompt;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
