//! Core domain types shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use url::Url;

/// Header of the year column in raw and cleaned files.
pub const YEAR_COLUMN: &str = "Year";
/// Header of the league column.
pub const LEAGUE_COLUMN: &str = "League";
/// Header of the player column.
pub const PLAYER_COLUMN: &str = "Player";
/// Header of the team column.
pub const TEAM_COLUMN: &str = "Team";

/// The four fixed columns that precede the metric column, in file order.
pub const KEY_COLUMNS: [&str; 4] = [YEAR_COLUMN, LEAGUE_COLUMN, PLAYER_COLUMN, TEAM_COLUMN];

// ---------------------------------------------------------------------------
// MetricLink
// ---------------------------------------------------------------------------

/// A metric found on a yearly index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricLink {
    /// Display name, used as the raw file's metric header.
    pub name: String,
    /// Absolute URL of the metric's leader table.
    pub url: Url,
}

// ---------------------------------------------------------------------------
// RawRecord
// ---------------------------------------------------------------------------

/// One league observation exactly as scraped. Nothing here is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub year: String,
    pub league: String,
    pub player: String,
    pub team: String,
    pub value: String,
}

impl RawRecord {
    /// Fields in raw file column order.
    pub fn to_row(&self) -> [&str; 5] {
        [
            self.year.as_str(),
            self.league.as_str(),
            self.player.as_str(),
            self.team.as_str(),
            self.value.as_str(),
        ]
    }
}

// ---------------------------------------------------------------------------
// CleanedRecord
// ---------------------------------------------------------------------------

/// A validated, normalized observation ready for load.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    pub year: i64,
    /// Trimmed, upper-case.
    pub league: String,
    /// Trimmed, case preserved.
    pub player: String,
    /// Trimmed, upper-case.
    pub team: String,
    /// Always finite.
    pub value: f64,
}

impl CleanedRecord {
    /// Fields in cleaned file column order.
    pub fn to_row(&self) -> [String; 5] {
        [
            self.year.to_string(),
            self.league.clone(),
            self.player.clone(),
            self.team.clone(),
            format_metric(self.value),
        ]
    }
}

/// Render a metric value so integral values keep a trailing `.0`.
///
/// `5.0` → `"5.0"`, `0.301` → `"0.301"`. Parsing the output yields the same value.
pub fn format_metric(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

// ---------------------------------------------------------------------------
// ValueType
// ---------------------------------------------------------------------------

/// SQL storage class of a metric column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Real,
    Integer,
}

impl ValueType {
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Real => "REAL",
            Self::Integer => "INTEGER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_formatting() {
        assert_eq!(format_metric(5.0), "5.0");
        assert_eq!(format_metric(0.301), "0.301");
        assert_eq!(format_metric(-2.0), "-2.0");
        assert_eq!(format_metric(1.5e20), "150000000000000000000");
        let back: f64 = format_metric(0.1 + 0.2).parse().unwrap();
        assert_eq!(back, 0.1 + 0.2);
    }

    #[test]
    fn cleaned_row_order() {
        let rec = CleanedRecord {
            year: 1901,
            league: "AL".into(),
            player: "Cy Young".into(),
            team: "BOS".into(),
            value: 5.0,
        };
        assert_eq!(rec.to_row(), ["1901", "AL", "Cy Young", "BOS", "5.0"]);
    }

    #[test]
    fn value_type_serde() {
        let v: ValueType = serde_json::from_str("\"integer\"").expect("deserialize");
        assert_eq!(v, ValueType::Integer);
        assert_eq!(ValueType::default().sql_type(), "REAL");
    }
}
