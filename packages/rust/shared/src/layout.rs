//! Column layout of a leader table row.
//!
//! A leader row carries several league observations side by side. Each
//! observation is a four-cell segment `(Year, Player, Stat, Team)` starting
//! at a fixed column. The layout says where each segment starts and which
//! league label it gets, independent of what the page prints.

use serde::{Deserialize, Serialize};

use crate::error::{AlmanacError, Result};

/// Cells per league segment: Year, Player, Stat, Team.
pub const SEGMENT_WIDTH: usize = 4;

/// Offsets within a segment.
pub const YEAR_OFFSET: usize = 0;
pub const PLAYER_OFFSET: usize = 1;
pub const STAT_OFFSET: usize = 2;
pub const TEAM_OFFSET: usize = 3;

/// One `[[layout]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueSegment {
    /// Index of the segment's Year cell.
    pub start_column: usize,
    /// League label written for every observation from this segment.
    pub league: String,
}

/// Ordered list of league segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnLayout {
    segments: Vec<LeagueSegment>,
}

impl Default for ColumnLayout {
    /// AL in columns 0–3, NL in columns 4–7.
    fn default() -> Self {
        Self {
            segments: vec![
                LeagueSegment {
                    start_column: 0,
                    league: "AL".into(),
                },
                LeagueSegment {
                    start_column: SEGMENT_WIDTH,
                    league: "NL".into(),
                },
            ],
        }
    }
}

impl ColumnLayout {
    /// Build and validate a layout.
    pub fn new(segments: Vec<LeagueSegment>) -> Result<Self> {
        let layout = Self { segments };
        layout.validate()?;
        Ok(layout)
    }

    pub fn segments(&self) -> &[LeagueSegment] {
        &self.segments
    }

    /// Minimum number of cells a row needs to cover every segment.
    pub fn min_cells(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.start_column + SEGMENT_WIDTH)
            .max()
            .unwrap_or(0)
    }

    /// Reject empty layouts, blank labels and overlapping segments.
    pub fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(AlmanacError::config("column layout has no segments"));
        }

        let mut sorted: Vec<&LeagueSegment> = self.segments.iter().collect();
        sorted.sort_by_key(|s| s.start_column);

        for pair in sorted.windows(2) {
            if pair[0].start_column + SEGMENT_WIDTH > pair[1].start_column {
                return Err(AlmanacError::config(format!(
                    "layout segments {} (col {}) and {} (col {}) overlap",
                    pair[0].league, pair[0].start_column, pair[1].league, pair[1].start_column
                )));
            }
        }

        if let Some(blank) = self.segments.iter().find(|s| s.league.trim().is_empty()) {
            return Err(AlmanacError::config(format!(
                "layout segment at col {} has an empty league label",
                blank.start_column
            )));
        }

        Ok(())
    }
}
