//! Stage orchestration for the almanac pipeline.
//!
//! This crate ties together discovery, scraping, cleaning and loading into
//! the three batch stages ([`Pipeline::scrape`], [`Pipeline::clean`],
//! [`Pipeline::load`]) and runs each under its own [`StageLogger`].

pub mod logging;
pub mod pipeline;
pub mod progress;

pub use logging::{DEFAULT_FILTER, LogFormat, LogSettings, StageLogger};
pub use pipeline::Pipeline;
pub use progress::{SilentProgress, StageProgress};
