//! Cleaned file → metric table.

use std::path::Path;

use tracing::{info, instrument, warn};

use almanac_shared::slug::{is_cleaned_file, slugify, table_name_for_cleaned};
use almanac_shared::types::{LEAGUE_COLUMN, PLAYER_COLUMN, TEAM_COLUMN, YEAR_COLUMN};
use almanac_shared::{AlmanacError, CleanedRecord, KEY_COLUMNS, MetricRegistry, MetricSpec, Result};

use crate::Store;

/// What [`SchemaLoader::load`] did with one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The table was recreated and filled.
    Loaded {
        table: String,
        column: String,
        rows: usize,
        /// `SELECT COUNT(*)` after the load.
        verified: u64,
    },
    /// The file had no data rows; the store was not touched.
    Empty,
}

/// Loads cleaned files using the metric mapping to name tables and columns.
pub struct SchemaLoader {
    registry: MetricRegistry,
}

impl SchemaLoader {
    pub fn new(registry: MetricRegistry) -> Self {
        Self { registry }
    }

    /// `*_cleaned.csv` files in `dir`, sorted by name. A missing directory
    /// has none.
    pub fn cleaned_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(dir).map_err(|e| AlmanacError::io(dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| AlmanacError::io(dir, e))?.path();
            if path.is_file() && is_cleaned_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Load one cleaned file into `store`.
    ///
    /// Everything is read and checked before the store is touched, so a
    /// header or value problem leaves any existing table as it was.
    #[instrument(skip_all, fields(file = %path.display()))]
    pub async fn load(&self, path: &Path, store: &Store) -> Result<LoadOutcome> {
        let file = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let stem = table_name_for_cleaned(path)
            .ok_or_else(|| AlmanacError::schema_mismatch(&file, "file name has no usable stem"))?;

        let Some(cleaned) = read_cleaned_file(path, &file)? else {
            warn!("empty cleaned file, skipping");
            return Ok(LoadOutcome::Empty);
        };

        let spec = self.registry.resolve(&stem)?;
        check_metric_header(&file, &cleaned.metric_header, &spec)?;

        store.replace_table(&spec, &cleaned.records).await?;
        info!(table = %spec.table, rows = cleaned.records.len(), "imported");

        let verified = store.row_count(&spec.table).await?;
        info!(table = %spec.table, rows = verified, "verified");

        Ok(LoadOutcome::Loaded {
            table: spec.table,
            column: spec.column,
            rows: cleaned.records.len(),
            verified,
        })
    }
}

struct CleanedFile {
    metric_header: String,
    records: Vec<CleanedRecord>,
}

/// The last header must name the same metric the file stem maps to.
fn check_metric_header(file: &str, header: &str, spec: &MetricSpec) -> Result<()> {
    let slug = slugify(header);
    if slug == spec.slug() || slug == spec.column {
        Ok(())
    } else {
        Err(AlmanacError::schema_mismatch(
            file,
            format!(
                "metric column '{header}' does not match table '{}' (expected '{}')",
                spec.table, spec.name
            ),
        ))
    }
}

/// `Ok(None)` when the file has no data rows.
fn read_cleaned_file(path: &Path, file: &str) -> Result<Option<CleanedFile>> {
    let mut reader = csv::ReaderBuilder::new()
        .from_path(path)
        .map_err(|e| AlmanacError::csv(path, e))?;

    let headers = reader.headers().map_err(|e| AlmanacError::csv(path, e))?.clone();
    let rows: Vec<csv::StringRecord> = reader
        .records()
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| AlmanacError::csv(path, e))?;

    if rows.is_empty() {
        return Ok(None);
    }

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let missing: Vec<&str> = KEY_COLUMNS
        .iter()
        .copied()
        .filter(|c| position(c).is_none())
        .collect();
    let metric = headers.len().saturating_sub(1);
    let metric_header = headers.get(metric).unwrap_or_default().trim().to_string();

    if !missing.is_empty() || KEY_COLUMNS.contains(&metric_header.as_str()) {
        return Err(AlmanacError::schema_mismatch(
            file,
            format!(
                "columns {:?}, expected Year, League, Player, Team and a metric column (missing: {})",
                headers.iter().collect::<Vec<_>>(),
                if missing.is_empty() { "metric".to_string() } else { missing.join(", ") }
            ),
        ));
    }

    // All key columns were found above.
    let [year_col, league_col, player_col, team_col] =
        [YEAR_COLUMN, LEAGUE_COLUMN, PLAYER_COLUMN, TEAM_COLUMN].map(|c| position(c).unwrap_or(0));

    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let line = index + 2;
        let field = |i: usize| row.get(i).unwrap_or_default().trim();

        let year = field(year_col).parse::<i64>().map_err(|_| {
            AlmanacError::schema_mismatch(
                file,
                format!("line {line}: year '{}' is not an integer", field(year_col)),
            )
        })?;
        let value = field(metric)
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                AlmanacError::schema_mismatch(
                    file,
                    format!("line {line}: metric value '{}' is not a number", field(metric)),
                )
            })?;

        records.push(CleanedRecord {
            year,
            league: field(league_col).to_string(),
            player: field(player_col).to_string(),
            team: field(team_col).to_string(),
            value,
        });
    }

    Ok(Some(CleanedFile {
        metric_header,
        records,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("almanac-{tag}-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn store_in(dir: &Path) -> Store {
        Store::open(&dir.join("baseball.db")).await.expect("open store")
    }

    fn loader() -> SchemaLoader {
        SchemaLoader::new(MetricRegistry::default())
    }

    #[tokio::test]
    async fn loads_home_runs() {
        let dir = temp_dir("load");
        let file = dir.join("home_runs_cleaned.csv");
        std::fs::write(&file, "Year,League,Player,Team,Home Runs\n1901,AL,Cy Young,BOS,5.0\n").unwrap();
        let store = store_in(&dir).await;

        let outcome = loader().load(&file, &store).await.unwrap();

        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                table: "home_runs".into(),
                column: "home_runs".into(),
                rows: 1,
                verified: 1,
            }
        );
        assert_eq!(
            store.table_columns("home_runs").await.unwrap(),
            ["id", "Year", "League", "Player", "Team", "home_runs"]
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_column_leaves_store_untouched() {
        let dir = temp_dir("load-missing");
        let store = store_in(&dir).await;
        let good = dir.join("home_runs_cleaned.csv");
        std::fs::write(&good, "Year,League,Player,Team,Home Runs\n1901,AL,Cy Young,BOS,5.0\n1902,NL,X,CHI,3.0\n").unwrap();
        loader().load(&good, &store).await.unwrap();

        let bad = dir.join("bad").join("home_runs_cleaned.csv");
        std::fs::create_dir_all(bad.parent().unwrap()).unwrap();
        std::fs::write(&bad, "Year,League,Player,Home Runs\n1903,AL,Z,7.0\n").unwrap();
        let err = loader().load(&bad, &store).await.unwrap_err();
        assert!(matches!(err, AlmanacError::SchemaMismatch { .. }), "got {err}");
        assert_eq!(store.row_count("home_runs").await.unwrap(), 2);

        let fresh = dir.join("hits_cleaned.csv");
        std::fs::write(&fresh, "Year,League,Player,Hits\n1903,AL,Z,7.0\n").unwrap();
        assert!(loader().load(&fresh, &store).await.is_err());
        assert!(!store.table_exists("hits").await.unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn lists_only_cleaned_files() {
        let dir = temp_dir("load-list");
        for name in ["runs_cleaned.csv", "hits_cleaned.csv", "hits.csv", "notes.txt"] {
            std::fs::write(dir.join(name), "").unwrap();
        }

        let files = SchemaLoader::cleaned_files(&dir).unwrap();
        assert_eq!(files, [dir.join("hits_cleaned.csv"), dir.join("runs_cleaned.csv")]);
        assert!(SchemaLoader::cleaned_files(&dir.join("absent")).unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn empty_file_creates_nothing() {
        let dir = temp_dir("load-empty");
        let store = store_in(&dir).await;
        let file = dir.join("runs_cleaned.csv");
        std::fs::write(&file, "Year,League,Player,Team,Runs\n").unwrap();

        assert_eq!(loader().load(&file, &store).await.unwrap(), LoadOutcome::Empty);
        assert!(!store.table_exists("runs").await.unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn configured_mapping_names_table_and_column() {
        let dir = temp_dir("load-mapped");
        let store = store_in(&dir).await;
        let registry = MetricRegistry::new(vec![MetricSpec {
            name: "Runs Batted In".into(),
            table: "rbi".into(),
            column: "rbi".into(),
            value_type: Default::default(),
        }])
        .unwrap();

        let file = dir.join("runs_batted_in_cleaned.csv");
        std::fs::write(&file, "Year,League,Player,Team,Runs Batted In\n1901,AL,Nap Lajoie,PHA,125.0\n").unwrap();

        let outcome = SchemaLoader::new(registry).load(&file, &store).await.unwrap();
        assert!(matches!(outcome, LoadOutcome::Loaded { ref table, .. } if table == "rbi"));
        assert_eq!(
            store.table_columns("rbi").await.unwrap().last().map(String::as_str),
            Some("rbi")
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn mismatched_metric_header_rejected() {
        let dir = temp_dir("load-wrong");
        let store = store_in(&dir).await;
        let file = dir.join("hits_cleaned.csv");
        std::fs::write(&file, "Year,League,Player,Team,Home Runs\n1901,AL,A,B,1.0\n").unwrap();

        let err = loader().load(&file, &store).await.unwrap_err();
        assert!(err.to_string().contains("does not match"), "got {err}");
        assert!(!store.table_exists("hits").await.unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
