//! Static metric → (table, column, value type) mapping.
//!
//! The registry is loaded from `[[metrics]]` config entries and validated once
//! at startup. Metrics that are discovered at scrape time but not configured
//! fall back to a derived spec whose table and column are the metric slug.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AlmanacError, Result};
use crate::slug::{is_sql_identifier, slugify};
use crate::types::{KEY_COLUMNS, ValueType};

/// Columns every metric table already has besides the metric column.
const RESERVED_COLUMNS: [&str; 5] = ["id", "year", "league", "player", "team"];

/// One `[[metrics]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Metric name as scraped (e.g. `Home Runs`).
    pub name: String,
    /// Target table.
    pub table: String,
    /// Target metric column.
    pub column: String,
    #[serde(default)]
    pub value_type: ValueType,
}

impl MetricSpec {
    /// Spec whose table and column are both the slug of `name`.
    pub fn derived(name: &str) -> Self {
        let slug = slugify(name);
        Self {
            name: name.to_string(),
            table: slug.clone(),
            column: slug,
            value_type: ValueType::Real,
        }
    }

    /// Slug of the metric name, i.e. the raw/cleaned file stem.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// Check identifiers of a single spec.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AlmanacError::validation("metric with empty name"));
        }
        for (what, ident) in [("table", &self.table), ("column", &self.column)] {
            if !is_sql_identifier(ident) {
                return Err(AlmanacError::validation(format!(
                    "metric '{}': {what} '{ident}' is not a valid SQL identifier",
                    self.name
                )));
            }
        }
        if RESERVED_COLUMNS.contains(&self.column.as_str()) {
            return Err(AlmanacError::validation(format!(
                "metric '{}': column '{}' clashes with a fixed column ({})",
                self.name,
                self.column,
                KEY_COLUMNS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Validated set of configured metrics.
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    specs: Vec<MetricSpec>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self {
            specs: default_metric_specs(),
        }
    }
}

impl MetricRegistry {
    /// Validate `specs` and build the registry.
    ///
    /// Fails on bad identifiers, on two names that slug to the same stem, and
    /// on duplicate tables or columns.
    pub fn new(specs: Vec<MetricSpec>) -> Result<Self> {
        let mut slugs: HashMap<String, &str> = HashMap::new();
        let mut tables: HashMap<&str, &str> = HashMap::new();
        let mut columns: HashMap<&str, &str> = HashMap::new();

        for spec in &specs {
            spec.validate()?;

            if let Some(prev) = slugs.insert(spec.slug(), &spec.name) {
                return Err(AlmanacError::validation(format!(
                    "metrics '{prev}' and '{}' collide on slug '{}'",
                    spec.name,
                    spec.slug()
                )));
            }
            if let Some(prev) = tables.insert(&spec.table, &spec.name) {
                return Err(AlmanacError::validation(format!(
                    "metrics '{prev}' and '{}' share table '{}'",
                    spec.name, spec.table
                )));
            }
            if let Some(prev) = columns.insert(&spec.column, &spec.name) {
                return Err(AlmanacError::validation(format!(
                    "metrics '{prev}' and '{}' share column '{}'",
                    spec.name, spec.column
                )));
            }
        }

        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[MetricSpec] {
        &self.specs
    }

    /// Look up a configured spec by file stem (metric slug) or table name.
    pub fn get(&self, stem: &str) -> Option<&MetricSpec> {
        self.specs
            .iter()
            .find(|s| s.slug() == stem)
            .or_else(|| self.specs.iter().find(|s| s.table == stem))
    }

    /// Configured spec for `stem`, or a validated derived one.
    pub fn resolve(&self, stem: &str) -> Result<MetricSpec> {
        if let Some(spec) = self.get(stem) {
            return Ok(spec.clone());
        }
        let derived = MetricSpec::derived(stem);
        derived.validate()?;
        if let Some(owner) = self.specs.iter().find(|s| s.table == derived.table) {
            return Err(AlmanacError::validation(format!(
                "derived table '{}' is already owned by metric '{}'",
                derived.table, owner.name
            )));
        }
        tracing::debug!(stem, table = %derived.table, "metric not configured, using derived mapping");
        Ok(derived)
    }
}

/// The tables external consumers expect to find.
pub fn default_metric_specs() -> Vec<MetricSpec> {
    [
        "Batting Average",
        "Home Runs",
        "Hits",
        "RBI",
        "Runs",
        "On Base Percentage",
        "Slugging Average",
    ]
    .into_iter()
    .map(MetricSpec::derived)
    .collect()
}
