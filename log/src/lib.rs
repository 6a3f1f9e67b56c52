use std::env;
use std::str::FromStr;
use std::sync::Mutex;

use slog::Drain;
use slog::{Discard, Fuse, Level};
use slog_async::Async;
use slog_json::Json;

pub use slog::{debug, error, info, o, trace, warn, Logger};

/// Variable holding the most verbose level to emit (`trace`, `debug`,
/// `info`, `warning`, `error` or `critical`).
pub const LEVEL_VARIABLE: &str = "BACKEND_LOG_LEVEL";

pub fn initialize_logger() -> slog::Logger {
    let level = env::var(LEVEL_VARIABLE)
        .ok()
        .and_then(|l| Level::from_str(&l).ok())
        .unwrap_or(Level::Debug);

    let drain = Mutex::new(Json::default(std::io::stderr())).map(Fuse);
    let drain = drain.filter_level(level).ignore_res();
    let drain = Async::new(drain).build().fuse();

    Logger::root(
        drain,
        o!("version" => info::VERSION, "revision" => info::REVISION, "build_timestamp" => info::BUILD_TIMESTAMP),
    )
}

/// A logger that swallows everything, for tests and one-off tools.
pub fn discard_logger() -> slog::Logger {
    Logger::root(Discard, o!())
}
