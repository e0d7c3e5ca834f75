//! Per-row validation and normalization.

use almanac_shared::{CleanedRecord, RawRecord};

/// Why a raw row did not survive cleaning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("year '{0}' is not an integer")]
    Year(String),

    #[error("league is empty")]
    EmptyLeague,

    #[error("player is empty")]
    EmptyPlayer,

    #[error("metric value '{0}' is not a finite number")]
    Metric(String),
}

/// Apply the row rules in order: year, league, player, metric, then
/// normalization.
pub fn clean_record(raw: &RawRecord) -> Result<CleanedRecord, Rejection> {
    let year = parse_year(&raw.year).ok_or_else(|| Rejection::Year(raw.year.clone()))?;

    let league = raw.league.trim();
    if league.is_empty() {
        return Err(Rejection::EmptyLeague);
    }

    // A cleaned row always names a player.
    let player = raw.player.trim();
    if player.is_empty() {
        return Err(Rejection::EmptyPlayer);
    }

    let value = parse_metric(&raw.value).ok_or_else(|| Rejection::Metric(raw.value.clone()))?;

    Ok(CleanedRecord {
        year,
        league: league.to_uppercase(),
        player: player.to_string(),
        team: raw.team.trim().to_uppercase(),
        value,
    })
}

/// `"1901"` and `"1901.0"` both parse; `"1901.5"` and `"abc"` do not.
pub fn parse_year(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(year) = text.parse::<i64>() {
        return Some(year);
    }
    let value = text.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= i64::MAX as f64 / 2.0 {
        Some(value as i64)
    } else {
        None
    }
}

/// Finite floats only; `NaN` and `inf` are rejected.
pub fn parse_metric(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Duplicate detection key: `(Year, League, Player, MetricValue)`.
///
/// Team is deliberately not part of the key, so one player listed for two
/// teams in the same season with the same value collapses to a single row
/// (first occurrence wins).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    year: i64,
    league: String,
    player: String,
    value_bits: u64,
}

impl DedupKey {
    pub fn of(record: &CleanedRecord) -> Self {
        // -0.0 and 0.0 are the same value.
        let value = if record.value == 0.0 { 0.0 } else { record.value };
        Self {
            year: record.year,
            league: record.league.clone(),
            player: record.player.clone(),
            value_bits: value.to_bits(),
        }
    }
}
