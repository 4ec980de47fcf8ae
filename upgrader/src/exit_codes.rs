//! Stable exit codes for upgrader CLI commands.

/// Run finished with a passing build, or inspect/init succeeded.
pub const OK: i32 = 0;
/// Invalid input, missing credentials, or a fatal phase failure.
pub const INVALID: i32 = 1;
/// Run finished but the build still fails after exhausting max attempts.
pub const BUILD_FAILED: i32 = 2;
