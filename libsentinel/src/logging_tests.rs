// libsentinel/src/logging_tests.rs

use super::logging;
use crate::test_utils::ENV_MUTEX;
use tracing::Level;

#[test]
fn init_sets_up_subscriber() {
    let _guard = ENV_MUTEX.lock().unwrap();
    // set RUST_LOG to something to test the EnvFilter path
    std::env::set_var("RUST_LOG", "debug");
    logging::init();
    tracing::event!(Level::INFO, "this is a test log");
    // a second call must not panic on the already-installed subscriber
    logging::init();
    std::env::remove_var("RUST_LOG");
}
