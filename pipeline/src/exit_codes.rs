//! Stable exit codes for pipeline CLI commands.

/// Command succeeded; for `decide`, the loop should continue.
pub const OK: i32 = 0;
/// Invalid input, unreadable payloads, or any other error.
pub const INVALID: i32 = 1;
/// `pipeline decide`: the loop should stop.
pub const STOP: i32 = 2;
/// `pipeline decide`: the loop should stop because the agent reported an error.
pub const AGENT_ERROR: i32 = 3;
