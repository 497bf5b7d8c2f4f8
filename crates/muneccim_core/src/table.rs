//! crates/muneccim_core/src/table.rs
//!
//! Filtering, sorting and pagination over a parsed dataset.
//!
//! Sorting cycles through three states per column: unsorted, ascending, descending.
//! Filters are case-sensitive substring matches, one per column, combined with AND.
//! Both are applied to the whole dataset before a page is sliced out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{ParsedDataset, Record};

pub const PAGE_SIZES: [usize; 5] = [10, 20, 30, 40, 50];
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TableError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    #[error("Unsupported page size: {0}")]
    UnsupportedPageSize(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortState {
    pub column: String,
    pub direction: SortDirection,
}

/// A user action against the table, as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TableAction {
    SetFilter { column: String, value: String },
    ClearFilters,
    ToggleSort { column: String },
    SetPageSize { page_size: usize },
    NextPage,
    PreviousPage,
    GoToPage { page: usize },
}

/// The view state of the table. It does not own the data; each query takes the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableState {
    filters: BTreeMap<String, String>,
    sort: Option<SortState>,
    page_index: usize,
    page_size: usize,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            filters: BTreeMap::new(),
            sort: None,
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One rendered page plus the pagination flags the client needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePage {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    pub page_index: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub filtered_row_count: usize,
    pub can_previous_page: bool,
    pub can_next_page: bool,
    pub sort: Option<SortState>,
    pub filters: BTreeMap<String, String>,
}

impl TableState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn sort(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn apply(&mut self, dataset: &ParsedDataset, action: TableAction) -> Result<(), TableError> {
        match action {
            TableAction::SetFilter { column, value } => self.set_filter(dataset, column, value),
            TableAction::ClearFilters => {
                self.filters.clear();
                self.page_index = 0;
                Ok(())
            }
            TableAction::ToggleSort { column } => self.toggle_sort(dataset, column),
            TableAction::SetPageSize { page_size } => self.set_page_size(page_size),
            TableAction::NextPage => {
                self.next_page(dataset);
                Ok(())
            }
            TableAction::PreviousPage => {
                self.previous_page();
                Ok(())
            }
            TableAction::GoToPage { page } => {
                self.go_to_page(dataset, page);
                Ok(())
            }
        }
    }

    /// Sets or, with an empty value, removes the filter on one column. Resets to page 0.
    pub fn set_filter(
        &mut self,
        dataset: &ParsedDataset,
        column: String,
        value: String,
    ) -> Result<(), TableError> {
        ensure_column(dataset, &column)?;
        if value.is_empty() {
            self.filters.remove(&column);
        } else {
            self.filters.insert(column, value);
        }
        self.page_index = 0;
        Ok(())
    }

    /// unsorted -> asc -> desc -> unsorted. A different column starts at asc. Resets to page 0.
    pub fn toggle_sort(&mut self, dataset: &ParsedDataset, column: String) -> Result<(), TableError> {
        ensure_column(dataset, &column)?;
        self.sort = match self.sort.take() {
            Some(SortState { column: current, direction: SortDirection::Asc }) if current == column => {
                Some(SortState { column, direction: SortDirection::Desc })
            }
            Some(SortState { column: current, direction: SortDirection::Desc }) if current == column => {
                None
            }
            _ => Some(SortState { column, direction: SortDirection::Asc }),
        };
        self.page_index = 0;
        Ok(())
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), TableError> {
        if !PAGE_SIZES.contains(&page_size) {
            return Err(TableError::UnsupportedPageSize(page_size));
        }
        self.page_size = page_size;
        self.page_index = 0;
        Ok(())
    }

    pub fn next_page(&mut self, dataset: &ParsedDataset) {
        if self.can_next_page(dataset) {
            self.page_index += 1;
        }
    }

    pub fn previous_page(&mut self) {
        self.page_index = self.page_index.saturating_sub(1);
    }

    /// Moves to `page`, clamped to the last page.
    pub fn go_to_page(&mut self, dataset: &ParsedDataset, page: usize) {
        self.page_index = page.min(self.page_count(dataset) - 1);
    }

    pub fn can_previous_page(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_next_page(&self, dataset: &ParsedDataset) -> bool {
        self.page_index + 1 < self.page_count(dataset)
    }

    /// Always at least 1, so an empty result still has one (empty) page.
    pub fn page_count(&self, dataset: &ParsedDataset) -> usize {
        self.filtered_len(dataset).div_ceil(self.page_size).max(1)
    }

    pub fn page(&self, dataset: &ParsedDataset) -> TablePage {
        let rows = self.filtered_sorted(dataset);
        let filtered_row_count = rows.len();
        let page_count = filtered_row_count.div_ceil(self.page_size).max(1);
        let page_rows = rows
            .into_iter()
            .skip(self.page_index * self.page_size)
            .take(self.page_size)
            .cloned()
            .collect();

        TablePage {
            columns: dataset.columns.clone(),
            rows: page_rows,
            page_index: self.page_index,
            page_size: self.page_size,
            page_count,
            filtered_row_count,
            can_previous_page: self.page_index > 0,
            can_next_page: self.page_index + 1 < page_count,
            sort: self.sort.clone(),
            filters: self.filters.clone(),
        }
    }

    fn matches(&self, row: &Record) -> bool {
        self.filters.iter().all(|(column, needle)| {
            row.get(column)
                .map(|value| value.contains(needle.as_str()))
                .unwrap_or(false)
        })
    }

    fn filtered_len(&self, dataset: &ParsedDataset) -> usize {
        dataset.rows.iter().filter(|row| self.matches(row)).count()
    }

    fn filtered_sorted<'a>(&self, dataset: &'a ParsedDataset) -> Vec<&'a Record> {
        let mut rows: Vec<&Record> = dataset.rows.iter().filter(|row| self.matches(row)).collect();
        if let Some(sort) = &self.sort {
            let column = sort.column.as_str();
            // Stable: ties keep dataset order in both directions.
            match sort.direction {
                SortDirection::Asc => rows.sort_by(|a, b| cell(a, column).cmp(cell(b, column))),
                SortDirection::Desc => rows.sort_by(|a, b| cell(b, column).cmp(cell(a, column))),
            }
        }
        rows
    }
}

/// Missing cells sort as empty text.
fn cell<'r>(row: &'r Record, column: &str) -> &'r str {
    row.get(column).map(String::as_str).unwrap_or("")
}

fn ensure_column(dataset: &ParsedDataset, column: &str) -> Result<(), TableError> {
    if dataset.columns.iter().any(|c| c == column) {
        Ok(())
    } else {
        Err(TableError::UnknownColumn(column.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(rows: usize) -> ParsedDataset {
        let columns = vec!["id".to_string(), "city".to_string()];
        let cities = ["Ankara", "Izmir", "Istanbul"];
        let rows = (0..rows)
            .map(|i| {
                Record::from([
                    ("id".to_string(), format!("{:02}", i)),
                    ("city".to_string(), cities[i % cities.len()].to_string()),
                ])
            })
            .collect();
        ParsedDataset { columns, rows }
    }

    fn ids(page: &TablePage) -> Vec<String> {
        page.rows.iter().map(|r| r["id"].clone()).collect()
    }

    #[test]
    fn paginates_twenty_five_rows() {
        let data = dataset(25);
        let mut table = TableState::new();

        let page = table.page(&data);
        assert_eq!(ids(&page).first().map(String::as_str), Some("00"));
        assert_eq!(ids(&page).last().map(String::as_str), Some("09"));
        assert!(!page.can_previous_page);
        assert!(page.can_next_page);
        assert_eq!(page.page_count, 3);

        table.next_page(&data);
        table.next_page(&data);
        let page = table.page(&data);
        assert_eq!(page.page_index, 2);
        assert_eq!(ids(&page), vec!["20", "21", "22", "23", "24"]);
        assert!(!page.can_next_page);
        assert!(page.can_previous_page);

        table.next_page(&data);
        assert_eq!(table.page_index(), 2);
    }

    #[test]
    fn filter_resets_to_first_page() {
        let data = dataset(25);
        let mut table = TableState::new();
        table.next_page(&data);
        assert_eq!(table.page_index(), 1);

        table
            .set_filter(&data, "city".to_string(), "Ankara".to_string())
            .unwrap();
        assert_eq!(table.page_index(), 0);
        table
            .set_filter(&data, "id".to_string(), "2".to_string())
            .unwrap();

        let page = table.page(&data);
        assert_eq!(page.page_index, 0);
        assert_eq!(page.filtered_row_count, 3);
        assert_eq!(page.page_count, 1);
        assert_eq!(ids(&page), vec!["12", "21", "24"]);
    }

    #[test]
    fn filters_are_case_sensitive_and_anded() {
        let data = dataset(9);
        let mut table = TableState::new();
        table
            .set_filter(&data, "city".to_string(), "ist".to_string())
            .unwrap();
        assert_eq!(table.page(&data).filtered_row_count, 0);

        table
            .set_filter(&data, "city".to_string(), "I".to_string())
            .unwrap();
        assert_eq!(table.page(&data).filtered_row_count, 6);

        table
            .set_filter(&data, "id".to_string(), "0".to_string())
            .unwrap();
        // ids 00..08 all contain "0"; Izmir/Istanbul rows are 1,2,4,5,7,8.
        assert_eq!(ids(&table.page(&data)), vec!["01", "02", "04", "05", "07", "08"]);

        table
            .set_filter(&data, "city".to_string(), String::new())
            .unwrap();
        assert_eq!(table.page(&data).filtered_row_count, 9);
    }

    #[test]
    fn empty_filter_result_has_one_empty_page() {
        let data = dataset(5);
        let mut table = TableState::new();
        table
            .set_filter(&data, "city".to_string(), "Bursa".to_string())
            .unwrap();
        let page = table.page(&data);
        assert_eq!(page.page_count, 1);
        assert!(page.rows.is_empty());
        assert!(!page.can_next_page);
    }

    #[test]
    fn sort_cycles_through_three_states() {
        let data = dataset(4);
        let mut table = TableState::new();

        table.toggle_sort(&data, "city".to_string()).unwrap();
        assert_eq!(table.sort().map(|s| s.direction), Some(SortDirection::Asc));
        assert_eq!(ids(&table.page(&data)), vec!["00", "03", "02", "01"]);

        table.toggle_sort(&data, "city".to_string()).unwrap();
        assert_eq!(table.sort().map(|s| s.direction), Some(SortDirection::Desc));
        assert_eq!(ids(&table.page(&data)), vec!["01", "02", "00", "03"]);

        table.toggle_sort(&data, "city".to_string()).unwrap();
        assert_eq!(table.sort(), None);
        assert_eq!(ids(&table.page(&data)), vec!["00", "01", "02", "03"]);
    }

    #[test]
    fn missing_cells_sort_as_empty() {
        let mut data = dataset(3);
        data.rows[1].remove("city");
        let mut table = TableState::new();

        table.toggle_sort(&data, "city".to_string()).unwrap();
        assert_eq!(ids(&table.page(&data)), vec!["01", "00", "02"]);

        table.toggle_sort(&data, "city".to_string()).unwrap();
        assert_eq!(ids(&table.page(&data)), vec!["02", "00", "01"]);
    }

    #[test]
    fn sorting_another_column_starts_ascending_and_resets_page() {
        let data = dataset(25);
        let mut table = TableState::new();
        table.toggle_sort(&data, "city".to_string()).unwrap();
        table.next_page(&data);
        table.toggle_sort(&data, "id".to_string()).unwrap();
        assert_eq!(table.page_index(), 0);
        assert_eq!(
            table.sort(),
            Some(&SortState {
                column: "id".to_string(),
                direction: SortDirection::Asc
            })
        );
    }

    #[test]
    fn page_size_must_come_from_the_fixed_set() {
        let data = dataset(45);
        let mut table = TableState::new();
        assert_eq!(
            table.set_page_size(15),
            Err(TableError::UnsupportedPageSize(15))
        );
        table.set_page_size(20).unwrap();
        assert_eq!(table.page_count(&data), 3);
        table.go_to_page(&data, 99);
        assert_eq!(table.page_index(), 2);
        assert_eq!(table.page(&data).rows.len(), 5);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let data = dataset(3);
        let mut table = TableState::new();
        assert_eq!(
            table.apply(&data, TableAction::ToggleSort { column: "zip".to_string() }),
            Err(TableError::UnknownColumn("zip".to_string()))
        );
    }

    #[test]
    fn actions_deserialize_from_tagged_json() {
        let action: TableAction =
            serde_json::from_str(r#"{"action":"set_filter","column":"city","value":"Iz"}"#).unwrap();
        assert_eq!(
            action,
            TableAction::SetFilter {
                column: "city".to_string(),
                value: "Iz".to_string()
            }
        );
        let action: TableAction = serde_json::from_str(r#"{"action":"next_page"}"#).unwrap();
        assert_eq!(action, TableAction::NextPage);
    }
}
