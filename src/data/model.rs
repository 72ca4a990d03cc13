use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::SchemaError;

// ---------------------------------------------------------------------------
// CellValue – a single cell in an extension column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the scalar types the table store returns.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 timestamp kept as text.
    DateTime(String),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Text form of the value, `None` for null and non-finite floats.
    ///
    /// Booleans render as `True` / `False`, which is how the upstream store
    /// writes the `Thumbs` rating.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::String(s) | CellValue::DateTime(s) => Some(Cow::Borrowed(s)),
            CellValue::Integer(i) => Some(Cow::Owned(i.to_string())),
            CellValue::Float(v) if v.is_finite() => Some(Cow::Owned(v.to_string())),
            CellValue::Float(_) => None,
            CellValue::Bool(true) => Some(Cow::Borrowed("True")),
            CellValue::Bool(false) => Some(Cow::Borrowed("False")),
            CellValue::Null => None,
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            CellValue::String(s) | CellValue::DateTime(s) => Some(s),
            other => other.as_text().map(Cow::into_owned),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::String(s) | CellValue::DateTime(s) => serializer.serialize_str(s),
            CellValue::Integer(i) => serializer.serialize_i64(*i),
            CellValue::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            CellValue::Float(_) | CellValue::Null => serializer.serialize_none(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

// ---------------------------------------------------------------------------
// KnownColumn – the columns the filter engine reads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownColumn {
    AiModel,
    ProjectName,
    Thumbs,
    UserQuery,
}

impl KnownColumn {
    pub const ALL: [KnownColumn; 4] = [
        KnownColumn::AiModel,
        KnownColumn::ProjectName,
        KnownColumn::Thumbs,
        KnownColumn::UserQuery,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KnownColumn::AiModel => "AI_Model",
            KnownColumn::ProjectName => "Project_Name",
            KnownColumn::Thumbs => "Thumbs",
            KnownColumn::UserQuery => "User_Query",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Record – one feedback row
// ---------------------------------------------------------------------------

/// One feedback record: typed slots for the known columns plus every other
/// column the source carried, kept verbatim.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    known: [Option<String>; 4],
    extra: BTreeMap<String, CellValue>,
}

/// Borrowed view of one cell, used when serialising a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellRef<'a> {
    Text(&'a str),
    Value(&'a CellValue),
    Null,
}

impl Serialize for CellRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellRef::Text(s) => serializer.serialize_str(s),
            CellRef::Value(v) => v.serialize(serializer),
            CellRef::Null => serializer.serialize_none(),
        }
    }
}

impl Record {
    /// Build a record from `(column, value)` pairs. Known columns are stored
    /// as text; a repeated column keeps its last value.
    pub fn from_cells<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = (String, CellValue)>,
    {
        let mut record = Record::default();
        for (name, value) in cells {
            match KnownColumn::from_name(&name) {
                Some(col) => record.known[col.slot()] = value.into_text(),
                None => {
                    record.extra.insert(name, value);
                }
            }
        }
        record
    }

    pub fn known(&self, column: KnownColumn) -> Option<&str> {
        self.known[column.slot()].as_deref()
    }

    pub fn extra(&self, name: &str) -> Option<&CellValue> {
        self.extra.get(name)
    }

    /// Cell for any column name. Unknown names read as null.
    pub fn cell(&self, name: &str) -> CellRef<'_> {
        match KnownColumn::from_name(name) {
            Some(col) => self.known(col).map_or(CellRef::Null, CellRef::Text),
            None => self
                .extra
                .get(name)
                .filter(|v| !v.is_null())
                .map_or(CellRef::Null, CellRef::Value),
        }
    }

    /// Non-null text of a column, `None` for null or absent cells.
    pub fn text(&self, name: &str) -> Option<Cow<'_, str>> {
        match KnownColumn::from_name(name) {
            Some(col) => self.known(col).map(Cow::Borrowed),
            None => self.extra.get(name).and_then(CellValue::as_text),
        }
    }

    /// Pair the record with a column order for serialisation.
    pub fn with_columns<'a>(&'a self, columns: &'a [String]) -> RowView<'a> {
        RowView {
            columns,
            record: self,
        }
    }
}

/// A record serialised as a JSON object whose keys follow the table's column order.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [String],
    record: &'a Record,
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in self.columns {
            map.serialize_entry(column, &self.record.cell(column))?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Table – ordered rows sharing one schema
// ---------------------------------------------------------------------------

/// An ordered sequence of records sharing a declared column list.
///
/// Every record has a value (possibly null) for exactly the declared columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    /// Build a table, checking every row against the declared columns.
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Result<Self, SchemaError> {
        let mut declared: HashSet<&str> = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !declared.insert(column.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.clone()));
            }
        }
        let extension: Vec<&str> = columns
            .iter()
            .map(String::as_str)
            .filter(|c| KnownColumn::from_name(c).is_none())
            .collect();

        for (i, row) in rows.iter().enumerate() {
            let mismatch = |column: &str| SchemaError::RowMismatch {
                row: i,
                column: column.to_string(),
            };
            for col in KnownColumn::ALL {
                if row.known(col).is_some() && !declared.contains(col.name()) {
                    return Err(mismatch(col.name()));
                }
            }
            if let Some(key) = row.extra.keys().find(|k| !declared.contains(k.as_str())) {
                return Err(mismatch(key));
            }
            if let Some(name) = extension.iter().find(|n| !row.extra.contains_key(**n)) {
                return Err(mismatch(name));
            }
        }

        Ok(Table { columns, rows })
    }

    /// Infer the schema from loosely-shaped rows: columns in first-seen
    /// order, absent cells filled with null. Zero rows yield the known columns.
    pub fn from_rows(rows: Vec<Vec<(String, CellValue)>>) -> Self {
        if rows.is_empty() {
            return Table {
                columns: KnownColumn::ALL.iter().map(|c| c.name().to_string()).collect(),
                rows: Vec::new(),
            };
        }

        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for row in &rows {
            for (name, _) in row {
                if seen.insert(name.clone()) {
                    columns.push(name.clone());
                }
            }
        }
        let extension: Vec<&String> = columns
            .iter()
            .filter(|c| KnownColumn::from_name(c).is_none())
            .collect();

        let records = rows
            .into_iter()
            .map(|cells| {
                let mut record = Record::from_cells(cells);
                for name in &extension {
                    if !record.extra.contains_key(name.as_str()) {
                        record.extra.insert((*name).clone(), CellValue::Null);
                    }
                }
                record
            })
            .collect();

        Table {
            columns,
            rows: records,
        }
    }

    /// Rows already known to match `columns`.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Table { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn require(&self, name: &str) -> Result<(), SchemaError> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(SchemaError::MissingColumn(name.to_string()))
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn cells(pairs: &[(&str, CellValue)]) -> Vec<(String, CellValue)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn known_columns_are_stored_as_text() {
        let record = Record::from_cells(cells(&[
            ("Thumbs", CellValue::Bool(true)),
            ("AI_Model", s("GPT-4")),
            ("User_Query", CellValue::Null),
        ]));
        assert_eq!(record.known(KnownColumn::Thumbs), Some("True"));
        assert_eq!(record.known(KnownColumn::AiModel), Some("GPT-4"));
        assert_eq!(record.known(KnownColumn::UserQuery), None);
    }

    #[test]
    fn non_finite_floats_read_as_null() {
        let record = Record::from_cells(cells(&[
            ("AI_Model", CellValue::Float(f64::NAN)),
            ("Project_Name", CellValue::Float(f64::INFINITY)),
            ("Score", CellValue::Float(f64::NAN)),
        ]));
        assert_eq!(record.known(KnownColumn::AiModel), None);
        assert_eq!(record.known(KnownColumn::ProjectName), None);
        assert_eq!(record.text("Score"), None);
    }

    #[test]
    fn from_rows_unions_columns_and_fills_nulls() {
        let table = Table::from_rows(vec![
            cells(&[("RowKey", s("1")), ("AI_Model", s("GPT-4"))]),
            cells(&[("AI_Model", s("Claude")), ("AI_Response", s("hi"))]),
        ]);
        assert_eq!(table.columns(), ["RowKey", "AI_Model", "AI_Response"]);
        assert_eq!(table.rows()[0].extra("AI_Response"), Some(&CellValue::Null));
        assert_eq!(table.rows()[1].extra("RowKey"), Some(&CellValue::Null));

        // The inferred table satisfies its own invariant.
        let rebuilt = Table::new(table.columns().to_vec(), table.rows().to_vec());
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn empty_rows_declare_known_columns() {
        let table = Table::from_rows(Vec::new());
        assert!(table.is_empty());
        for col in KnownColumn::ALL {
            assert!(table.has_column(col.name()));
        }
    }

    #[test]
    fn new_rejects_rows_outside_schema() {
        let row = Record::from_cells(cells(&[("AI_Model", s("GPT-4")), ("Extra", s("x"))]));

        let err = Table::new(vec!["AI_Model".into()], vec![row.clone()]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::RowMismatch {
                row: 0,
                column: "Extra".into()
            }
        );

        let err = Table::new(vec!["Extra".into()], vec![row.clone()]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::RowMismatch {
                row: 0,
                column: "AI_Model".into()
            }
        );

        let err = Table::new(
            vec!["AI_Model".into(), "Extra".into(), "Missing".into()],
            vec![row],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::RowMismatch {
                row: 0,
                column: "Missing".into()
            }
        );
    }

    #[test]
    fn new_rejects_duplicate_columns() {
        let err = Table::new(vec!["Thumbs".into(), "Thumbs".into()], Vec::new()).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateColumn("Thumbs".into()));
    }

    #[test]
    fn row_view_serialises_in_column_order() {
        let table = Table::from_rows(vec![cells(&[
            ("User_Query", s("hello")),
            ("Score", CellValue::Integer(3)),
            ("Ratio", CellValue::Float(f64::NAN)),
            ("AI_Model", CellValue::Null),
        ])]);
        let json = serde_json::to_string(&table.rows()[0].with_columns(table.columns())).unwrap();
        assert_eq!(
            json,
            r#"{"User_Query":"hello","Score":3,"Ratio":null,"AI_Model":null}"#
        );
    }
}
