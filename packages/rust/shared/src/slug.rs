//! Metric slugs and the file/table naming convention built on them.
//!
//! A slug is the lower-case, underscore-joined form of a metric name. It is
//! the raw file stem, the table name and the metric column name, so every
//! stage must derive it the same way.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Extension shared by raw and cleaned files.
pub const CSV_EXTENSION: &str = "csv";

/// Suffix appended to a raw stem to name its cleaned file.
pub const CLEAN_SUFFIX: &str = "_cleaned";

/// Lower-case the name and replace spaces with underscores.
pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// `Home Runs` → `home_runs.csv`.
pub fn raw_file_name(metric_name: &str) -> String {
    format!("{}.{CSV_EXTENSION}", slugify(metric_name))
}

/// `home_runs` → `home_runs_cleaned.csv`.
pub fn cleaned_file_name(raw_stem: &str) -> String {
    format!("{raw_stem}{CLEAN_SUFFIX}.{CSV_EXTENSION}")
}

/// Derive the target table name from a cleaned file path.
///
/// Returns `None` when the path has no UTF-8 stem.
pub fn table_name_for_cleaned(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let base = stem.strip_suffix(CLEAN_SUFFIX).unwrap_or(stem);
    Some(slugify(base))
}

/// Whether `name` ends in `_cleaned.csv`.
pub fn is_cleaned_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(&format!("{CLEAN_SUFFIX}.{CSV_EXTENSION}")))
}

/// Whether `name` can be used unquoted as a SQLite identifier.
pub fn is_sql_identifier(name: &str) -> bool {
    static IDENT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid regex"));
    IDENT_RE.is_match(name)
}

/// Double-quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
