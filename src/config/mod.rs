#[cfg(feature = "cli")]
pub mod cli;
pub mod tracker_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use tracker_config::TrackerConfig;
