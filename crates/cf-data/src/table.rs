//! Columnar numeric input tables.
//!
//! A [`ColumnTable`] is the raw material events are built from: a set of
//! equally long numeric columns keyed by name, read from a JSON file of the
//! form `{"columns": {"ht": [612.0, ...], "mht": [231.0, ...]}}`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use cf_core::{Error, Result};

#[derive(Debug, Deserialize)]
struct RawTable {
    columns: HashMap<String, Vec<f64>>,
}

/// A named set of equally long numeric columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnTable {
    n_rows: usize,
    columns: HashMap<String, Vec<f64>>,
}

impl ColumnTable {
    /// Build a table from already materialized columns.
    ///
    /// All columns must have the same length and contain only finite values.
    pub fn from_columns(columns: HashMap<String, Vec<f64>>) -> Result<Self> {
        let mut n_rows: Option<usize> = None;
        for (name, col) in &columns {
            match n_rows {
                Some(n) if n != col.len() => {
                    return Err(Error::Validation(format!(
                        "column length mismatch for '{}': expected {}, got {}",
                        name,
                        n,
                        col.len()
                    )));
                }
                Some(_) => {}
                None => n_rows = Some(col.len()),
            }
            if col.iter().any(|x| !x.is_finite()) {
                return Err(Error::Validation(format!(
                    "column '{}' contains non-finite values",
                    name
                )));
            }
        }
        Ok(ColumnTable { n_rows: n_rows.unwrap_or(0), columns })
    }

    /// Read a table from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let raw: RawTable = serde_json::from_str(&text)?;
        Self::from_columns(raw.columns)
    }

    /// Number of rows (events).
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|c| c.as_slice())
    }

    /// Whether a column of this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(entries: &[(&str, &[f64])]) -> HashMap<String, Vec<f64>> {
        entries.iter().map(|(n, v)| (n.to_string(), v.to_vec())).collect()
    }

    #[test]
    fn equal_length_columns() {
        let t = ColumnTable::from_columns(cols(&[
            ("ht", &[1.0, 2.0, 3.0]),
            ("mht", &[4.0, 5.0, 6.0]),
        ]))
        .unwrap();
        assert_eq!(t.n_rows(), 3);
        assert_eq!(t.column("ht"), Some([1.0, 2.0, 3.0].as_slice()));
        assert!(t.column("met").is_none());
    }

    #[test]
    fn empty_table_has_zero_rows() {
        let t = ColumnTable::from_columns(HashMap::new()).unwrap();
        assert_eq!(t.n_rows(), 0);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = ColumnTable::from_columns(cols(&[("a", &[1.0, 2.0]), ("b", &[1.0])]))
            .unwrap_err();
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let err = ColumnTable::from_columns(cols(&[("a", &[1.0, f64::NAN])])).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn parses_json_form() {
        let raw: RawTable =
            serde_json::from_str(r#"{"columns": {"ht": [612.0], "mht": [231.0]}}"#).unwrap();
        let t = ColumnTable::from_columns(raw.columns).unwrap();
        assert_eq!(t.n_rows(), 1);
        assert!(t.has_column("mht"));
    }
}
