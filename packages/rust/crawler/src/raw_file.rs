//! Raw per-metric CSV output.

use std::path::Path;

use almanac_shared::{AlmanacError, KEY_COLUMNS, RawRecord, Result};

/// Write `records` under a `Year,League,Player,Team,<metric>` header.
///
/// The file is written beside its target and renamed into place, so a
/// failed write never leaves a partial raw file that would be mistaken for
/// a finished scrape.
pub fn write_raw_file(path: &Path, metric_name: &str, records: &[RawRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AlmanacError::io(parent, e))?;
    }

    let tmp = path.with_extension("csv.partial");
    let written = write_records(&tmp, metric_name, records);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    std::fs::rename(&tmp, path).map_err(|e| AlmanacError::io(path, e))
}

fn write_records(path: &Path, metric_name: &str, records: &[RawRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| AlmanacError::csv(path, e))?;

    let mut header: Vec<&str> = KEY_COLUMNS.to_vec();
    header.push(metric_name);
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

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn writes_header_and_rows() {
        let dir = std::env::temp_dir().join(format!("almanac-raw-{}", Uuid::now_v7()));
        let path = dir.join("home_runs.csv");
        let records = vec![RawRecord {
            year: "1901".into(),
            league: "AL".into(),
            player: "Lajoie, Nap".into(),
            team: "PHA".into(),
            value: "14".into(),
        }];

        write_raw_file(&path, "Home Runs", &records).expect("write");

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Year,League,Player,Team,Home Runs"));
        assert_eq!(lines.next(), Some("1901,AL,\"Lajoie, Nap\",PHA,14"));
        assert!(!path.with_extension("csv.partial").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
