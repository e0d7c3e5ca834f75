//! Raw file validation, normalization and deduplication.
//!
//! [`RecordCleaner`] turns one raw per-metric file into one cleaned file
//! with the same column shape. Row-level problems drop the row; a file
//! whose header is unusable fails as a whole and writes nothing.

mod rules;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use almanac_shared::slug::{CSV_EXTENSION, cleaned_file_name, is_cleaned_file};
use almanac_shared::types::{LEAGUE_COLUMN, PLAYER_COLUMN, TEAM_COLUMN, YEAR_COLUMN};
use almanac_shared::{AlmanacError, CleanedRecord, KEY_COLUMNS, RawRecord, Result};

pub use rules::{DedupKey, Rejection, clean_record, parse_metric, parse_year};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Counts for one cleaned file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub rows_in: usize,
    pub rows_out: usize,
    pub bad_year: usize,
    pub empty_league: usize,
    pub empty_player: usize,
    pub bad_metric: usize,
    pub duplicates: usize,
}

impl CleanStats {
    pub fn removed(&self) -> usize {
        self.rows_in - self.rows_out
    }

    fn reject(&mut self, rejection: &Rejection) {
        match rejection {
            Rejection::Year(_) => self.bad_year += 1,
            Rejection::EmptyLeague => self.empty_league += 1,
            Rejection::EmptyPlayer => self.empty_player += 1,
            Rejection::Metric(_) => self.bad_metric += 1,
        }
    }
}

/// Result of cleaning one raw file.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub path: PathBuf,
    pub stats: CleanStats,
}

// ---------------------------------------------------------------------------
// RecordCleaner
// ---------------------------------------------------------------------------

/// Writes cleaned files into one output directory.
pub struct RecordCleaner {
    output_dir: PathBuf,
}

impl RecordCleaner {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Raw files in `dir`, sorted by name. Cleaned files are never inputs.
    pub fn raw_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|e| AlmanacError::io(dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| AlmanacError::io(dir, e))?.path();
            let is_csv = path.extension().and_then(|e| e.to_str()) == Some(CSV_EXTENSION);
            if path.is_file() && is_csv && !is_cleaned_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Clean `raw_path` into `<output_dir>/<stem>_cleaned.csv`.
    #[instrument(skip_all, fields(file = %raw_path.display()))]
    pub fn clean(&self, raw_path: &Path) -> Result<CleanOutcome> {
        let stem = raw_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| AlmanacError::validation(format!("bad file name: {}", raw_path.display())))?;

        let (metric_header, raw_records) = read_raw_file(raw_path)?;
        let (records, stats) = clean_records(&raw_records);

        info!(
            original = stats.rows_in,
            surviving = stats.rows_out,
            removed = stats.removed(),
            "cleaned"
        );
        debug!(
            bad_year = stats.bad_year,
            empty_league = stats.empty_league,
            empty_player = stats.empty_player,
            bad_metric = stats.bad_metric,
            duplicates = stats.duplicates,
            "rejections"
        );

        std::fs::create_dir_all(&self.output_dir).map_err(|e| AlmanacError::io(&self.output_dir, e))?;
        let path = self.output_dir.join(cleaned_file_name(stem));
        write_cleaned_file(&path, &metric_header, &records)?;
        info!(path = %path.display(), "saved cleaned file");

        Ok(CleanOutcome { path, stats })
    }
}

/// Run the row rules and first-wins dedup over `raw`.
pub fn clean_records(raw: &[RawRecord]) -> (Vec<CleanedRecord>, CleanStats) {
    let mut stats = CleanStats {
        rows_in: raw.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for record in raw {
        match clean_record(record) {
            Ok(cleaned) => {
                if seen.insert(DedupKey::of(&cleaned)) {
                    out.push(cleaned);
                } else {
                    stats.duplicates += 1;
                }
            }
            Err(rejection) => stats.reject(&rejection),
        }
    }

    stats.rows_out = out.len();
    (out, stats)
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Column positions resolved from a raw header.
struct HeaderMap {
    year: usize,
    league: usize,
    player: usize,
    team: usize,
    metric: usize,
}

impl HeaderMap {
    fn resolve(path: &Path, headers: &csv::StringRecord) -> Result<(Self, String)> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| csv_error(path, format!("missing column '{name}'")))
        };

        let metric = headers
            .len()
            .checked_sub(1)
            .ok_or_else(|| csv_error(path, "empty header"))?;
        let metric_header = headers[metric].trim().to_string();
        if metric_header.is_empty() || KEY_COLUMNS.contains(&metric_header.as_str()) {
            return Err(csv_error(
                path,
                format!("last column '{metric_header}' is not a metric column"),
            ));
        }

        let map = Self {
            year: find(YEAR_COLUMN)?,
            league: find(LEAGUE_COLUMN)?,
            player: find(PLAYER_COLUMN)?,
            team: find(TEAM_COLUMN)?,
            metric,
        };
        Ok((map, metric_header))
    }

    fn record(&self, row: &csv::StringRecord) -> RawRecord {
        let field = |i: usize| row.get(i).unwrap_or_default().to_string();
        RawRecord {
            year: field(self.year),
            league: field(self.league),
            player: field(self.player),
            team: field(self.team),
            value: field(self.metric),
        }
    }
}

fn read_raw_file(path: &Path) -> Result<(String, Vec<RawRecord>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| AlmanacError::csv(path, e))?;

    let headers = reader.headers().map_err(|e| AlmanacError::csv(path, e))?.clone();
    let (map, metric_header) = HeaderMap::resolve(path, &headers)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| AlmanacError::csv(path, e))?;
        records.push(map.record(&row));
    }
    Ok((metric_header, records))
}

fn write_cleaned_file(path: &Path, metric_header: &str, records: &[CleanedRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| AlmanacError::csv(path, e))?;

    let mut header: Vec<&str> = KEY_COLUMNS.to_vec();
    header.push(metric_header);
    writer
        .write_record(&header)
        .map_err(|e| AlmanacError::csv(path, e))?;

    for record in records {
        writer
            .write_record(record.to_row())
            .map_err(|e| AlmanacError::csv(path, e))?;
    }
    writer.flush().map_err(|e| AlmanacError::io(path, e))
}

fn csv_error(path: &Path, message: impl Into<String>) -> AlmanacError {
    AlmanacError::Csv {
        path: path.to_path_buf(),
        message: message.into(),
    }
}
