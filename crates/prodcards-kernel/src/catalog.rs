//! In-memory product catalog
//!
//! A [`Catalog`] is an ordered sequence of [`Record`]s sharing one column
//! layout. It is built once at start-up and never mutated afterwards, so it
//! can be shared between front ends behind an `Arc` without locking.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Errors
// ============================================================================

/// Catalog construction / loading error
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("catalog has no columns")]
    NoColumns,

    #[error("row {row} has {found} fields, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("download failed: {0}")]
    Download(String),
}

/// Catalog result type
pub type CatalogResult<T> = Result<T, CatalogError>;

// ============================================================================
// Cells and columns
// ============================================================================

/// A single scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Parse a raw cell as the given column type, falling back to text.
    pub fn parse_as(raw: &str, kind: ColumnType) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match kind {
            ColumnType::Integer => trimmed
                .parse()
                .map(CellValue::Integer)
                .unwrap_or_else(|_| CellValue::Text(raw.to_string())),
            ColumnType::Float => parse_finite(trimmed)
                .map(CellValue::Float)
                .unwrap_or_else(|| CellValue::Text(raw.to_string())),
            ColumnType::Boolean => parse_bool(trimmed)
                .map(CellValue::Boolean)
                .unwrap_or_else(|| CellValue::Text(raw.to_string())),
            ColumnType::Text | ColumnType::Empty => CellValue::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Integer(i) => write!(f, "{}", i),
            // Whole floats keep their decimal point so "100.0" stays distinguishable from 100
            CellValue::Float(x) if x.fract() == 0.0 && x.abs() < 1e16 => write!(f, "{:.1}", x),
            CellValue::Float(x) => write!(f, "{}", x),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Integer(i)
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        CellValue::Float(x)
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|x| x.is_finite())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Declared value type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    /// Every cell in the column is empty
    Empty,
}

impl ColumnType {
    /// Whether the column holds textual / categorical data
    pub fn is_textual(&self) -> bool {
        matches!(self, ColumnType::Text)
    }

    /// Infer the narrowest type that fits every non-empty cell.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let mut all_int = true;
        let mut all_float = true;
        let mut all_bool = true;
        let mut seen = false;

        for cell in cells {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            seen = true;
            all_int &= cell.parse::<i64>().is_ok();
            all_float &= parse_finite(cell).is_some();
            all_bool &= parse_bool(cell).is_some();
            if !all_int && !all_float && !all_bool {
                return ColumnType::Text;
            }
        }

        match (seen, all_int, all_float, all_bool) {
            (false, ..) => ColumnType::Empty,
            (true, true, _, _) => ColumnType::Integer,
            (true, _, true, _) => ColumnType::Float,
            (true, _, _, true) => ColumnType::Boolean,
            _ => ColumnType::Text,
        }
    }
}

/// Column name plus its declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One product: column name -> scalar value, in catalog column order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<CellValue>,
}

impl Record {
    /// Look up a field by column name
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Look up a field by column position
    pub fn value(&self, index: usize) -> Option<&CellValue> {
        self.values.get(index)
    }

    /// Iterate `(column, value)` pairs in column order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Newline-joined `key: value` rendering of every field
    pub fn render_fields(&self) -> String {
        self.fields()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// JSON object view, used for debug dumps
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields()
            .map(|(k, v)| {
                let value = serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
                (k.to_string(), value)
            })
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Immutable table of products
#[derive(Debug, Clone)]
pub struct Catalog {
    schema: Vec<ColumnSchema>,
    names: Arc<[String]>,
    records: Vec<Record>,
}

impl Catalog {
    /// Build a catalog from typed rows.
    ///
    /// Every row must have exactly one value per column.
    pub fn new(schema: Vec<ColumnSchema>, rows: Vec<Vec<CellValue>>) -> CatalogResult<Self> {
        if schema.is_empty() {
            return Err(CatalogError::NoColumns);
        }
        let names: Arc<[String]> = schema.iter().map(|c| c.name.clone()).collect();

        let mut records = Vec::with_capacity(rows.len());
        for (idx, values) in rows.into_iter().enumerate() {
            if values.len() != names.len() {
                return Err(CatalogError::RaggedRow {
                    row: idx + 1,
                    expected: names.len(),
                    found: values.len(),
                });
            }
            records.push(Record {
                columns: Arc::clone(&names),
                values,
            });
        }

        Ok(Self {
            schema,
            names,
            records,
        })
    }

    /// Build a catalog from raw string cells, inferring each column's type.
    pub fn from_string_rows<H, R, C>(headers: Vec<H>, rows: Vec<R>) -> CatalogResult<Self>
    where
        H: Into<String>,
        R: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|r| r.into_iter().map(Into::into).collect())
            .collect();

        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(CatalogError::RaggedRow {
                    row: idx + 1,
                    expected: headers.len(),
                    found: row.len(),
                });
            }
        }

        let schema: Vec<ColumnSchema> = headers
            .into_iter()
            .enumerate()
            .map(|(col, name)| {
                let kind = ColumnType::infer(rows.iter().map(|r| r[col].as_str()));
                ColumnSchema::new(name, kind)
            })
            .collect();

        let typed = rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(schema.iter())
                    .map(|(raw, column)| CellValue::parse_as(raw, column.kind))
                    .collect()
            })
            .collect();

        Self::new(schema, typed)
    }

    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|c| c == name)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// First `n` records in catalog order
    pub fn head(&self, n: usize) -> &[Record] {
        &self.records[..n.min(self.records.len())]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        Catalog::from_string_rows(
            vec!["id", "name", "price", "rating"],
            vec![
                vec!["1", "Sony Speaker", "100", "4.5"],
                vec!["2", "Wireless Earbuds Pro", "59", ""],
            ],
        )
        .unwrap()
    }

    #[test]
    fn infers_column_types() {
        let catalog = sample();
        let kinds: Vec<_> = catalog.schema().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnType::Integer,
                ColumnType::Text,
                ColumnType::Integer,
                ColumnType::Float
            ]
        );
    }

    #[test]
    fn all_empty_column_is_not_textual() {
        assert_eq!(ColumnType::infer(["", "  "]), ColumnType::Empty);
        assert!(!ColumnType::Empty.is_textual());
        assert_eq!(ColumnType::infer(["true", "FALSE"]), ColumnType::Boolean);
        assert_eq!(ColumnType::infer(["1", "x"]), ColumnType::Text);
    }

    #[test]
    fn record_renders_fields_in_column_order() {
        let catalog = sample();
        let record = catalog.record(0).unwrap();
        assert_eq!(
            record.render_fields(),
            "id: 1\nname: Sony Speaker\nprice: 100\nrating: 4.5"
        );
        assert_eq!(
            record.get("name"),
            Some(&CellValue::Text("Sony Speaker".into()))
        );
        assert!(catalog.record(1).unwrap().get("rating").unwrap().is_empty());
    }

    #[test]
    fn whole_floats_keep_decimal_point() {
        assert_eq!(CellValue::Float(100.0).to_string(), "100.0");
        assert_eq!(CellValue::Float(4.25).to_string(), "4.25");
    }

    #[test]
    fn rejects_ragged_rows_and_empty_schema() {
        let err = Catalog::from_string_rows(vec!["a", "b"], vec![vec!["1"]]).unwrap_err();
        assert!(matches!(err, CatalogError::RaggedRow { row: 1, .. }));

        let err = Catalog::new(vec![], vec![]).unwrap_err();
        assert!(matches!(err, CatalogError::NoColumns));
    }

    #[test]
    fn head_is_clamped() {
        let catalog = sample();
        assert_eq!(catalog.head(10).len(), 2);
        assert_eq!(catalog.head(1).len(), 1);
    }

    #[test]
    fn to_json_keeps_types() {
        let catalog = sample();
        let json = catalog.record(0).unwrap().to_json();
        assert_eq!(json["name"], "Sony Speaker");
        assert_eq!(json["price"], 100);
    }
}
