pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::HttpTransport;
pub use crate::app::Console;
pub use crate::config::TrackerConfig;
pub use crate::core::tracker::{DispatchHandle, Tracker};
pub use crate::core::DispatchOutcome;
pub use crate::utils::error::{Result, TrackerError};
