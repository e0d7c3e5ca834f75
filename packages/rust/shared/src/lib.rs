//! Shared types, error model, and configuration for the almanac pipeline.
//!
//! This crate is the foundation depended on by all other almanac crates.
//! It provides:
//! - [`AlmanacError`]: the unified error type
//! - Domain types ([`RawRecord`], [`CleanedRecord`], [`MetricLink`])
//! - Naming convention ([`slug`]), row layout ([`ColumnLayout`]) and the
//!   metric mapping ([`MetricRegistry`])
//! - Stage reports ([`StageReport`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod report;
pub mod slug;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, NavigationConfig, PathsConfig, SourceConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{AlmanacError, Result};
pub use layout::{ColumnLayout, LeagueSegment};
pub use metrics::{MetricRegistry, MetricSpec};
pub use report::{ItemReport, ItemStatus, Stage, StageReport};
pub use types::{CleanedRecord, KEY_COLUMNS, MetricLink, RawRecord, ValueType, format_metric};
