//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
pub fn init() {
    env_logger::init();
}

/// Initialize logging, ignoring the error raised when a logger is already set.
///
/// Useful from tests and from embedding applications that may have installed
/// their own logger first.
pub fn try_init() {
    let _ = env_logger::try_init();
}

/// Initialize logging with `level` as the default filter; `RUST_LOG` still applies per module
pub fn init_with_level(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
