//! Stable exit codes for gate CLI commands.

/// Request admitted, or command succeeded.
pub const OK: i32 = 0;
/// Invalid input or internal error. Hook callers treat this as non-blocking.
pub const INVALID: i32 = 1;
/// `gate pre-tool-use` refused the request.
pub const BLOCKED: i32 = 2;
