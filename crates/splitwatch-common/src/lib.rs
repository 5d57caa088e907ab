//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Shared primitives and utilities for the core runtime."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
//! Core shared primitives for the splitwatch workspace.
//! This crate exposes configuration loading, logging, the monotonic clock
//! source, duration formatting, and version metadata consumed across the
//! workspace.

pub mod config;
pub mod format;
pub mod logging;
pub mod time;
pub mod version;

pub use config::{
    ApiConfig, AppConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, StoreConfig, TimerConfig,
};
pub use format::format_duration;
pub use logging::{init_cli_tracing, init_tracing, LogFormat};
pub use time::{ClockSource, ManualClock, SharedClock, SystemClock};
pub use version::VersionInfo;
