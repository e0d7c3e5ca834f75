//! Leader-table row extraction.

use scraper::{Html, Selector};

use almanac_shared::layout::{PLAYER_OFFSET, STAT_OFFSET, TEAM_OFFSET, YEAR_OFFSET};
use almanac_shared::{AlmanacError, ColumnLayout, RawRecord, Result};

use crate::navigator::element_text;

/// Cell texts of every `<tr>` in every table matching `table_selector`,
/// in document order.
pub fn extract_rows(html: &str, table_selector: &Selector) -> Vec<Vec<String>> {
    let doc = Html::parse_document(html);
    let tr_sel = Selector::parse("tr").expect("valid selector");
    let td_sel = Selector::parse("td").expect("valid selector");

    doc.select(table_selector)
        .flat_map(|table| table.select(&tr_sel).collect::<Vec<_>>())
        .map(|row| row.select(&td_sel).map(|td| element_text(&td)).collect())
        .collect()
}

/// Split one row into per-league raw records.
///
/// - `Ok(None)`: the row is too short or some segment's year is not numeric
///   (headers, notes). Skipped silently.
/// - `Err(_)`: the row looked like data but a stat cell was empty.
pub fn parse_row(cells: &[String], layout: &ColumnLayout) -> Result<Option<Vec<RawRecord>>> {
    if cells.len() < layout.min_cells() {
        return Ok(None);
    }

    let mut records = Vec::with_capacity(layout.segments().len());
    for segment in layout.segments() {
        let base = segment.start_column;
        let stat_col = base + STAT_OFFSET;
        let value = first_token(&cells[stat_col]).ok_or_else(|| {
            AlmanacError::parse(format!("empty stat cell in column {stat_col}"))
        })?;

        records.push(RawRecord {
            year: cells[base + YEAR_OFFSET].trim().to_string(),
            league: segment.league.clone(),
            player: cells[base + PLAYER_OFFSET].trim().to_string(),
            team: cells[base + TEAM_OFFSET].trim().to_string(),
            value: value.to_string(),
        });
    }

    if !records.iter().all(|r| is_numeric_year(&r.year)) {
        return Ok(None);
    }
    Ok(Some(records))
}

/// `"16 (2 teams)"` → `"16"`.
fn first_token(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}

fn is_numeric_year(year: &str) -> bool {
    !year.is_empty() && year.bytes().all(|b| b.is_ascii_digit())
}
