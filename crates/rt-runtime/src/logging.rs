//! Dual terminal+file logging init, in the style of the rest of the
//! workspace's server binaries: INFO to terminal, DEBUG to a
//! timestamped file under `logs/`.

use std::fs::File;
use std::time::{SystemTime, UNIX_EPOCH};

/// Initializes the global logger. Safe to call once per process; a
/// second call returns an error which callers should surface, not
/// silently swallow (tests rely on `simplelog`'s own re-init guard).
pub fn init_logging() -> Result<(), log::SetLoggerError> {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).expect("time moves slow").as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        File::create(format!("logs/{timestamp}.log")).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file])
}
