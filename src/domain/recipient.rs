//! Recipient records read from the tabular source
//!
//! A [`RecipientTable`] is built from the raw cell grid of a sheet: the first
//! row is the header, every following row becomes one [`RecipientRecord`]
//! keyed by that header.

use super::errors::InvoicerError;
use super::result::Result;
use serde::Serialize;

/// One spreadsheet row keyed by the header row
///
/// Column order follows the header. Every record of a table has exactly the
/// header's columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientRecord {
    fields: Vec<(String, String)>,
}

impl RecipientRecord {
    /// Builds a record from (column, value) pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `column`, if the column exists
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Value of `column`, or a configuration error naming the column
    pub fn require(&self, column: &str) -> Result<&str> {
        self.get(column).ok_or_else(|| {
            InvoicerError::Configuration(format!("Recipient column '{column}' is missing"))
        })
    }

    /// Column names in header order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

/// Header plus records, as read from the source
#[derive(Debug, Clone)]
pub struct RecipientTable {
    header: Vec<String>,
    records: Vec<RecipientRecord>,
}

impl RecipientTable {
    /// Builds a table from a grid of cells
    ///
    /// Returns `None` when the grid has no header row. Short rows are padded
    /// with empty strings and cells beyond the header are dropped, so every
    /// record carries the same columns. Fully blank rows are skipped.
    pub fn from_grid(mut grid: Vec<Vec<String>>) -> Option<Self> {
        if grid.is_empty() {
            return None;
        }
        let header: Vec<String> = grid.remove(0).into_iter().map(|h| h.trim().to_string()).collect();
        if header.iter().all(|h| h.is_empty()) {
            return None;
        }

        let records = grid
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|row| {
                let mut cells = row.into_iter();
                RecipientRecord::from_pairs(
                    header
                        .iter()
                        .map(|column| (column.clone(), cells.next().unwrap_or_default())),
                )
            })
            .collect();

        Some(Self { header, records })
    }

    /// Header columns
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Checks that every required column is present in the header
    ///
    /// # Errors
    ///
    /// Returns a configuration error listing all missing columns.
    pub fn require_columns<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let missing: Vec<&str> = required
            .into_iter()
            .filter(|column| !self.header.iter().any(|h| h == column))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(InvoicerError::Configuration(format!(
                "Recipient source is missing expected columns: {} (found: {})",
                missing.join(", "),
                self.header.join(", ")
            )))
        }
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the table has a header but no data rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consumes the table and returns its records in row order
    pub fn into_records(self) -> Vec<RecipientRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_from_grid_keys_rows_by_header() {
        let table = RecipientTable::from_grid(grid(&[
            &["Naam", "Email"],
            &["A", "a@x.com"],
            &["B", "b@x.com"],
        ]))
        .unwrap();

        assert_eq!(table.len(), 2);
        let records = table.into_records();
        assert_eq!(records[0].get("Naam"), Some("A"));
        assert_eq!(records[1].get("Email"), Some("b@x.com"));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = RecipientTable::from_grid(grid(&[
            &["Naam", "Email", "Woonplaats"],
            &["A", "a@x.com"],
        ]))
        .unwrap();

        let record = &table.into_records()[0];
        assert_eq!(record.get("Woonplaats"), Some(""));
        assert_eq!(record.columns().count(), 3);
    }

    #[test]
    fn test_extra_cells_are_dropped() {
        let table =
            RecipientTable::from_grid(grid(&[&["Naam"], &["A", "stray", "cells"]])).unwrap();
        let record = &table.into_records()[0];
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["Naam"]);
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let table =
            RecipientTable::from_grid(grid(&[&["Naam"], &["A"], &["", " "], &["B"]])).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_empty_grid_has_no_table() {
        assert!(RecipientTable::from_grid(vec![]).is_none());
        assert!(RecipientTable::from_grid(grid(&[&["", ""]])).is_none());
    }

    #[test]
    fn test_require_columns_reports_all_missing() {
        let table = RecipientTable::from_grid(grid(&[&["Naam", "Email"]])).unwrap();
        assert!(table.is_empty());

        let err = table
            .require_columns(["Naam", "Adres", "Postcode"])
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Adres"));
        assert!(msg.contains("Postcode"));
        assert!(msg.contains("missing expected columns: Adres, Postcode ("));
    }

    #[test]
    fn test_require_missing_column() {
        let record = RecipientRecord::from_pairs([("Naam", "A")]);
        assert_eq!(record.require("Naam").unwrap(), "A");
        assert!(matches!(
            record.require("Email"),
            Err(InvoicerError::Configuration(_))
        ));
    }
}
