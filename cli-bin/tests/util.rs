//! tests/util.rs
//! Small helpers shared across integration tests.

use assert_cmd::Command;
use std::path::PathBuf;

/// Absolute path to the freshly-built `sentinel` binary.
pub fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sentinel"))
}

/// Build a `Command` for `sentinel` with none of the `SENTINEL_*`
/// variables leaking in from the caller's environment.
pub fn sentinel() -> Command {
    let mut cmd = Command::new(bin());
    cmd.env_remove("SENTINEL_DEBOUNCE_MS")
        .env_remove("SENTINEL_MAX_QUEUE")
        .env_remove("SENTINEL_EXCLUDE");
    cmd
}
