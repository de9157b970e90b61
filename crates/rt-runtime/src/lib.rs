//! Process lifecycle, config loading, and control endpoints (spec
//! §4.8, §6). Ties together every account-wide singleton and the
//! per-character schedulers built in `rt-scheduler`.

pub mod config;
pub mod control;
pub mod logging;
pub mod manager;

pub use config::{load_from_path, ConfigError, RuntimeConfigFile};
pub use manager::{GameApiFactory, OperationDescriptor, RuntimeError, RuntimeManager, RuntimeState, RuntimeStatus};
