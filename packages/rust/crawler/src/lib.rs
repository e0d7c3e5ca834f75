//! Leader-table scraping.
//!
//! This crate provides:
//! - [`navigator`]: Page loading, render waits, and pagination ([`PageNavigator`], [`HttpNavigator`])
//! - [`rows`]: Paired-league row extraction driven by a [`ColumnLayout`](almanac_shared::ColumnLayout)
//! - [`table`]: Per-metric scraper that walks every page and writes one raw file
//! - [`raw_file`]: Atomic raw CSV writer

pub mod navigator;
pub mod raw_file;
pub mod rows;
pub mod table;

pub use navigator::{Advance, HttpNavigator, LoadedPage, PageNavigator, element_text, parse_selector};
pub use raw_file::write_raw_file;
pub use rows::{extract_rows, parse_row};
pub use table::{ScrapeOutcome, TableScraper};
