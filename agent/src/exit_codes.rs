//! Stable exit codes for agent CLI commands.

/// The command succeeded (parser generated, or existing parser validated).
pub const OK: i32 = 0;
/// Missing input files, invalid config, or the workflow failed.
pub const FAILED: i32 = 1;
