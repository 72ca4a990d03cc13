use std::collections::BTreeSet;

use super::model::{KnownColumn, Record, RowView, Table};
use crate::error::SchemaError;

/// Placeholder the selection controls send for "do not filter on this field".
pub const ALL_SENTINEL: &str = "All";

// ---------------------------------------------------------------------------
// Filter criteria
// ---------------------------------------------------------------------------

/// The filters of one query. `None` means the filter is inactive.
///
/// Setters absorb the UI sentinel: `"All"` or an empty selection clears the
/// field, and the free-text query is trimmed, so an active field always holds
/// a value to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    ai_model: Option<String>,
    project_name: Option<String>,
    thumbs: Option<String>,
    user_query: Option<String>,
}

fn selection(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != ALL_SENTINEL)
}

fn search_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl FilterCriteria {
    pub fn ai_model(mut self, value: impl Into<Option<String>>) -> Self {
        self.ai_model = selection(value.into());
        self
    }

    pub fn project_name(mut self, value: impl Into<Option<String>>) -> Self {
        self.project_name = selection(value.into());
        self
    }

    pub fn thumbs(mut self, value: impl Into<Option<String>>) -> Self {
        self.thumbs = selection(value.into());
        self
    }

    pub fn user_query(mut self, value: impl Into<Option<String>>) -> Self {
        self.user_query = search_text(value.into());
        self
    }

    /// Active exact-match filters in evaluation order.
    fn exact_matches(&self) -> impl Iterator<Item = (KnownColumn, &str)> {
        [
            (KnownColumn::AiModel, self.ai_model.as_deref()),
            (KnownColumn::ProjectName, self.project_name.as_deref()),
            (KnownColumn::Thumbs, self.thumbs.as_deref()),
        ]
        .into_iter()
        .filter_map(|(col, value)| value.map(|v| (col, v)))
    }

    /// Whether no filter is active.
    pub fn is_identity(&self) -> bool {
        self.ai_model.is_none()
            && self.project_name.is_none()
            && self.thumbs.is_none()
            && self.user_query.is_none()
    }
}

// ---------------------------------------------------------------------------
// Filter engine
// ---------------------------------------------------------------------------

/// Return indices of rows that pass all active filters, in table order.
///
/// Filters apply conjunctively in a fixed order: `AI_Model`, `Project_Name`,
/// `Thumbs` by exact string equality, then a case-insensitive substring
/// search on `User_Query`. A row whose `User_Query` is null never matches an
/// active search. Referencing a column the table lacks is a [`SchemaError`].
pub fn filtered_indices(table: &Table, criteria: &FilterCriteria) -> Result<Vec<usize>, SchemaError> {
    let rows = table.rows();
    let mut indices: Vec<usize> = (0..rows.len()).collect();

    for (column, wanted) in criteria.exact_matches() {
        table.require(column.name())?;
        indices.retain(|&i| rows[i].known(column) == Some(wanted));
    }

    if let Some(query) = criteria.user_query.as_deref() {
        table.require(KnownColumn::UserQuery.name())?;
        let needle = fold_case(query);
        indices.retain(|&i| {
            rows[i]
                .known(KnownColumn::UserQuery)
                .is_some_and(|text| fold_case(text).contains(&needle))
        });
    }

    Ok(indices)
}

/// Per-character lowercase, without the word-final sigma rule of
/// `str::to_lowercase`, so `Σ`, `σ` and `ς` all compare equal.
fn fold_case(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ς' { 'σ' } else { c })
        .collect()
}

/// Rows of a table that survived filtering, with the table's full column list.
#[derive(Debug, Clone)]
pub struct FilterResult<'a> {
    pub columns: &'a [String],
    pub rows: Vec<&'a Record>,
    pub count: usize,
}

impl<'a> FilterResult<'a> {
    /// Rows paired with the column order, ready for serialisation.
    pub fn row_views(&self) -> impl Iterator<Item = RowView<'a>> + '_ {
        self.rows.iter().map(|r| r.with_columns(self.columns))
    }

    /// Copy the surviving rows into a standalone table.
    pub fn to_table(&self) -> Table {
        Table::from_parts(
            self.columns.to_vec(),
            self.rows.iter().map(|r| (*r).clone()).collect(),
        )
    }
}

/// Apply `criteria` to `table` without modifying it.
pub fn apply_filters<'a>(table: &'a Table, criteria: &FilterCriteria) -> Result<FilterResult<'a>, SchemaError> {
    let rows: Vec<&Record> = filtered_indices(table, criteria)?
        .into_iter()
        .map(|i| &table.rows()[i])
        .collect();
    Ok(FilterResult {
        columns: table.columns(),
        count: rows.len(),
        rows,
    })
}

// ---------------------------------------------------------------------------
// Distinct values for selection controls
// ---------------------------------------------------------------------------

/// Sorted unique non-null values of `column`.
pub fn distinct_sorted(table: &Table, column: &str) -> Result<Vec<String>, SchemaError> {
    table.require(column)?;
    let values: BTreeSet<String> = table
        .rows()
        .iter()
        .filter_map(|r| r.text(column))
        .map(|v| v.into_owned())
        .collect();
    Ok(values.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;

    fn row(ai: &str, project: &str, thumbs: &str, query: Option<&str>) -> Vec<(String, CellValue)> {
        let text = |v: &str| CellValue::String(v.to_string());
        vec![
            ("AI_Model".into(), text(ai)),
            ("Project_Name".into(), text(project)),
            ("Thumbs".into(), text(thumbs)),
            (
                "User_Query".into(),
                query.map_or(CellValue::Null, text),
            ),
            ("RowKey".into(), text(format!("{ai}-{project}").as_str())),
        ]
    }

    fn scenario_table() -> Table {
        Table::from_rows(vec![
            row("GPT-4", "P1", "up", Some("how to sort a list")),
            row("Claude", "P2", "down", Some("explain recursion")),
        ])
    }

    fn wider_table() -> Table {
        Table::from_rows(vec![
            row("GPT-4", "P1", "True", Some("Hello World")),
            row("Claude", "P1", "False", Some("hello again")),
            row("GPT-4", "P2", "True", None),
            row("GPT-4", "P1", "False", Some("goodbye")),
            row("Claude", "P2", "True", Some("HELLO there")),
        ])
    }

    fn keys(result: &FilterResult<'_>) -> Vec<String> {
        result
            .rows
            .iter()
            .map(|r| r.text("RowKey").unwrap().into_owned())
            .collect()
    }

    #[test]
    fn exact_model_filter_keeps_first_row() {
        let table = scenario_table();
        let criteria = FilterCriteria::default().ai_model("GPT-4".to_string());
        let result = apply_filters(&table, &criteria).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.rows[0], &table.rows()[0]);
    }

    #[test]
    fn query_filter_is_case_insensitive() {
        let table = scenario_table();
        let criteria = FilterCriteria::default().user_query("REC".to_string());
        let result = apply_filters(&table, &criteria).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.rows[0], &table.rows()[1]);
    }

    #[test]
    fn all_sentinel_is_identity() {
        let table = scenario_table();
        let criteria = FilterCriteria::default()
            .ai_model("All".to_string())
            .thumbs("All".to_string());
        assert!(criteria.is_identity());
        let result = apply_filters(&table, &criteria).unwrap();
        assert_eq!(result.to_table(), table);
    }

    #[test]
    fn whitespace_query_is_inactive() {
        let table = wider_table();
        let criteria = FilterCriteria::default().user_query("   ".to_string());
        assert!(criteria.is_identity());
        assert_eq!(apply_filters(&table, &criteria).unwrap().count, table.len());
    }

    #[test]
    fn missing_column_is_named() {
        let table = Table::from_rows(vec![vec![
            ("AI_Model".into(), CellValue::String("GPT-4".into())),
            ("User_Query".into(), CellValue::String("q".into())),
        ]]);
        let criteria = FilterCriteria::default().thumbs("up".to_string());
        let err = apply_filters(&table, &criteria).unwrap_err();
        assert_eq!(err, SchemaError::MissingColumn("Thumbs".into()));

        // Inactive filters do not touch the column.
        assert!(apply_filters(&table, &FilterCriteria::default()).is_ok());
    }

    #[test]
    fn filters_combine_conjunctively_in_order() {
        let table = wider_table();
        let criteria = FilterCriteria::default()
            .ai_model("GPT-4".to_string())
            .project_name("P1".to_string())
            .user_query("  hello ".to_string());
        let result = apply_filters(&table, &criteria).unwrap();
        assert_eq!(keys(&result), ["GPT-4-P1"]);
        assert_eq!(result.columns, table.columns());
    }

    #[test]
    fn exact_match_is_sound_and_complete() {
        let table = wider_table();
        let criteria = FilterCriteria::default().thumbs("True".to_string());
        let result = apply_filters(&table, &criteria).unwrap();
        let kept = filtered_indices(&table, &criteria).unwrap();

        for (i, record) in table.rows().iter().enumerate() {
            let matches = record.known(KnownColumn::Thumbs) == Some("True");
            assert_eq!(matches, kept.contains(&i));
        }
        assert!(result
            .rows
            .iter()
            .all(|r| r.known(KnownColumn::Thumbs) == Some("True")));
        assert_eq!(result.count, result.rows.len());
    }

    #[test]
    fn exact_match_does_not_fold_case() {
        let table = wider_table();
        let criteria = FilterCriteria::default().thumbs("true".to_string());
        assert_eq!(apply_filters(&table, &criteria).unwrap().count, 0);
    }

    #[test]
    fn distinct_skips_non_finite_floats() {
        let table = Table::from_rows(vec![
            vec![("AI_Model".to_string(), CellValue::Float(f64::NAN))],
            vec![("AI_Model".to_string(), CellValue::Float(1.5))],
        ]);
        assert_eq!(distinct_sorted(&table, "AI_Model").unwrap(), ["1.5"]);
    }

    #[test]
    fn search_folds_greek_sigma() {
        let table = Table::from_rows(vec![
            row("GPT-4", "P1", "True", Some("ΟΔΟΣ")),
            row("Claude", "P1", "True", Some("οδός")),
        ]);
        let criteria = FilterCriteria::default().user_query("σ".to_string());
        assert_eq!(apply_filters(&table, &criteria).unwrap().count, 2);

        let criteria = FilterCriteria::default().user_query("ΟΔΟς".to_string());
        assert_eq!(filtered_indices(&table, &criteria).unwrap(), [0]);
    }

    #[test]
    fn null_queries_never_match_search() {
        let table = wider_table();
        let criteria = FilterCriteria::default().user_query("e".to_string());
        let result = apply_filters(&table, &criteria).unwrap();
        assert!(result
            .rows
            .iter()
            .all(|r| r.known(KnownColumn::UserQuery).is_some()));
        assert_eq!(result.count, 4);
    }

    #[test]
    fn result_preserves_source_order() {
        let table = wider_table();
        let criteria = FilterCriteria::default().user_query("hello".to_string());
        let indices = filtered_indices(&table, &criteria).unwrap();
        assert_eq!(indices, [0, 1, 4]);
    }

    #[test]
    fn refiltering_is_idempotent() {
        let table = wider_table();
        let criteria = FilterCriteria::default()
            .ai_model("Claude".to_string())
            .user_query("hello".to_string());
        let once = apply_filters(&table, &criteria).unwrap().to_table();
        let twice = apply_filters(&once, &criteria).unwrap().to_table();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn empty_table_filters_to_empty() {
        let table = Table::from_rows(Vec::new());
        let criteria = FilterCriteria::default().ai_model("GPT-4".to_string());
        let result = apply_filters(&table, &criteria).unwrap();
        assert_eq!(result.count, 0);
        assert_eq!(result.columns.len(), 4);
    }

    #[test]
    fn distinct_values_are_sorted_without_nulls() {
        let table = wider_table();
        assert_eq!(distinct_sorted(&table, "AI_Model").unwrap(), ["Claude", "GPT-4"]);
        assert_eq!(
            distinct_sorted(&table, "User_Query").unwrap(),
            ["HELLO there", "Hello World", "goodbye", "hello again"]
        );
        assert_eq!(
            distinct_sorted(&table, "Missing").unwrap_err(),
            SchemaError::MissingColumn("Missing".into())
        );
        assert!(distinct_sorted(&Table::from_rows(Vec::new()), "Thumbs")
            .unwrap()
            .is_empty());
    }
}
