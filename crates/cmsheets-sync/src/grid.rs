//! CSV report text to a display grid.
//!
//! Campaign Manager CSV files carry a metadata preamble, then a
//! `Report Fields` marker row, the column header and data rows, and finally a
//! grand-total footer row. `transform` keeps everything between the marker
//! and the footer.
//!
//! Two outcomes are distinguished: content that is not UTF-8 CSV is a
//! `MalformedReport` error, while valid CSV with nothing to show (no marker,
//! or no rows between marker and footer) yields an empty grid that callers
//! must not write.

use cmsheets_core::{Grid, SyncError};
use tracing::warn;

/// First cell of the row that ends the metadata preamble
pub const REPORT_FIELDS_MARKER: &str = "Report Fields";

/// Trim a CSV report into a rectangular grid.
///
/// Rows up to and including the marker row are dropped, then the last row
/// (the grand total) is dropped. Without a marker row every row is dropped.
/// Short rows are padded with empty cells to the widest row.
pub fn transform(raw_csv: &[u8]) -> Result<Grid, SyncError> {
    let mut rows = parse(raw_csv)?;

    match rows.iter().position(|row| is_marker(row)) {
        Some(marker) => {
            rows.drain(..=marker);
        }
        None => {
            if !rows.is_empty() {
                warn!(rows = rows.len(), "report has no '{REPORT_FIELDS_MARKER}' row; nothing to show");
            }
            return Ok(Grid::new());
        }
    }

    // Grand-total footer
    if rows.pop().is_none() {
        return Ok(Grid::new());
    }

    Ok(pad(rows))
}

fn parse(raw_csv: &[u8]) -> Result<Grid, SyncError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw_csv);

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| SyncError::MalformedReport(e.to_string()))
        })
        .collect()
}

fn is_marker(row: &[String]) -> bool {
    row.first().is_some_and(|cell| cell == REPORT_FIELDS_MARKER)
}

fn pad(mut rows: Grid) -> Grid {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid(rows: &[&[&str]]) -> Grid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn keeps_rows_between_marker_and_footer() {
        let csv = "Campaign Manager Report\n\
                   Date Range,2026-01-01 - 2026-01-31\n\
                   \n\
                   Report Fields\n\
                   Date,Campaign,Impressions\n\
                   2026-01-01,Spring,100\n\
                   2026-01-02,Spring,120\n\
                   Grand Total:,,220\n";

        let out = transform(csv.as_bytes()).unwrap();

        assert_eq!(
            out,
            grid(&[
                &["Date", "Campaign", "Impressions"],
                &["2026-01-01", "Spring", "100"],
                &["2026-01-02", "Spring", "120"],
            ])
        );
    }

    #[test]
    fn n_data_rows_survive_for_any_preamble_length() {
        for preamble in 0..4 {
            for n in 0..5 {
                let mut csv = String::new();
                for i in 0..preamble {
                    csv.push_str(&format!("meta {i},x\n"));
                }
                csv.push_str("Report Fields\n");
                for i in 0..n {
                    csv.push_str(&format!("row {i},{i}\n"));
                }
                csv.push_str("Grand Total:,99\n");

                let out = transform(csv.as_bytes()).unwrap();
                assert_eq!(out.len(), n, "preamble {preamble}, rows {n}");
                assert!(out.iter().all(|r| r[0] != "Report Fields" && r[0] != "Grand Total:"));
            }
        }
    }

    #[test]
    fn missing_marker_yields_empty_grid() {
        let csv = "Date,Impressions\n2026-01-01,100\nGrand Total:,100\n";
        assert_eq!(transform(csv.as_bytes()).unwrap(), Grid::new());
    }

    #[test]
    fn marker_and_footer_only_is_empty() {
        assert_eq!(transform(b"Report Fields\nGrand Total:,0\n").unwrap(), Grid::new());
    }

    #[test]
    fn marker_without_footer_is_guarded() {
        assert_eq!(transform(b"preamble\nReport Fields\n").unwrap(), Grid::new());
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(transform(b"").unwrap(), Grid::new());
    }

    #[test]
    fn ragged_rows_are_padded() {
        let csv = "Report Fields\nA,B,C\n1\n2,3\nTotal\n";
        assert_eq!(
            transform(csv.as_bytes()).unwrap(),
            grid(&[&["A", "B", "C"], &["1", "", ""], &["2", "3", ""]])
        );
    }

    #[test]
    fn quoted_cells_keep_commas() {
        let csv = "Report Fields\nCampaign,Clicks\n\"Spring, EU\",5\nTotal,5\n";
        assert_eq!(
            transform(csv.as_bytes()).unwrap(),
            grid(&[&["Campaign", "Clicks"], &["Spring, EU", "5"]])
        );
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = transform(b"Report Fields\nA\n\xff\xfe,1\nTotal\n").unwrap_err();
        assert!(matches!(err, SyncError::MalformedReport(_)));
    }
}
