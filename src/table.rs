use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::columns::{
    COLUMNS, CellValue, ColumnDef, ColumnId, FilterKind, SortingKind, column, compare_alphanumeric,
};
use crate::ranking::{RankInfo, compare_items, rank_item};
use crate::strategy::EnrichedRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reverse(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: ColumnId,
    pub direction: SortDirection,
}

#[derive(Debug, Default, Clone)]
pub struct TableViewState {
    pub column_filters: HashMap<ColumnId, String>,
    pub global_filter: String,
    /// Columns missing from the map are visible.
    pub column_visibility: HashMap<ColumnId, bool>,
    /// Sort keys in priority order.
    pub sorting: Vec<SortSpec>,
}

/// A row of the current projection with the search ranks of its columns.
#[derive(Debug, Clone)]
pub struct ProjectedRow {
    pub index: usize,
    pub ranks: HashMap<ColumnId, RankInfo>,
}

/// Filter, search, sort and visibility state over the joined rows.
pub struct TableViewModel {
    rows: Arc<Vec<EnrichedRow>>,
    state: TableViewState,
    sort_follows_filter: Option<ColumnId>,
}

impl TableViewModel {
    pub fn new(rows: Vec<EnrichedRow>, sort_follows_filter: Option<ColumnId>) -> Self {
        Self {
            rows: Arc::new(rows),
            state: TableViewState::default(),
            sort_follows_filter,
        }
    }

    pub fn rows(&self) -> &[EnrichedRow] {
        &self.rows
    }

    pub fn column_filter(&self, column: ColumnId) -> Option<&str> {
        self.state.column_filters.get(&column).map(String::as_str)
    }

    /// Replaces the filter of `column`, an empty value removes it.
    pub fn set_column_filter(&mut self, column_id: ColumnId, value: impl Into<String>) {
        let value = value.into();
        if !column(column_id).can_filter() {
            warn!("Column {} can not be filtered", column_id.as_str());
            return;
        }
        trace!("Filter {} = {:?}", column_id.as_str(), value);
        if value.is_empty() {
            self.state.column_filters.remove(&column_id);
            return;
        }
        let appeared = self.state.column_filters.insert(column_id, value).is_none();

        // Only a newly set filter moves the sort, refining it keeps a manual sort
        if appeared
            && self.sort_follows_filter == Some(column_id)
            && self.state.sorting.first().map(|s| s.column) != Some(column_id)
        {
            debug!("Filter on {} switches sorting to it", column_id.as_str());
            self.set_sort(column_id, SortDirection::Ascending);
        }
    }

    pub fn global_filter(&self) -> &str {
        &self.state.global_filter
    }

    pub fn set_global_filter(&mut self, text: impl Into<String>) {
        self.state.global_filter = text.into();
        trace!("Global filter = {:?}", self.state.global_filter);
    }

    pub fn set_sort(&mut self, column: ColumnId, direction: SortDirection) {
        self.state.sorting = vec![SortSpec { column, direction }];
    }

    pub fn clear_sort(&mut self) {
        self.state.sorting.clear();
    }

    pub fn sort_direction(&self, column: ColumnId) -> Option<SortDirection> {
        self.state
            .sorting
            .iter()
            .find(|s| s.column == column)
            .map(|s| s.direction)
    }

    /// Cycles the sort of a column: first direction, opposite direction, unsorted.
    /// Numeric columns start descending, text columns ascending.
    pub fn toggle_sort(&mut self, column_id: ColumnId) {
        let first = if column(column_id).numeric {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        match self.sort_direction(column_id) {
            None => self.set_sort(column_id, first),
            Some(direction) if direction == first => self.set_sort(column_id, first.reverse()),
            Some(_) => self.clear_sort(),
        }
    }

    pub fn set_column_visibility(&mut self, column: ColumnId, visible: bool) {
        self.state.column_visibility.insert(column, visible);
    }

    pub fn show_all_columns(&mut self) {
        self.state.column_visibility.clear();
    }

    pub fn is_column_visible(&self, column: ColumnId) -> bool {
        self.state
            .column_visibility
            .get(&column)
            .copied()
            .unwrap_or(true)
    }

    pub fn visible_columns(&self) -> Vec<&'static ColumnDef> {
        COLUMNS
            .iter()
            .filter(|c| self.is_column_visible(c.id))
            .collect()
    }

    /// Rows passing every column filter and the global search, sorted.
    pub fn projection(&self) -> Vec<ProjectedRow> {
        let start_time = Instant::now();

        let filters: Vec<(ColumnId, FilterKind, String)> = self
            .state
            .column_filters
            .iter()
            .filter_map(|(&id, value)| column(id).filter.map(|kind| (id, kind, value.to_lowercase())))
            .collect();

        let candidates: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                filters
                    .iter()
                    .all(|(id, kind, needle)| passes_filter(*kind, id.value(row), needle))
            })
            .map(|(idx, _)| idx)
            .collect();

        let query = self.state.global_filter.as_str();
        let mut projected: Vec<ProjectedRow> = if query.is_empty() {
            candidates
                .into_iter()
                .map(|index| ProjectedRow {
                    index,
                    ranks: HashMap::new(),
                })
                .collect()
        } else {
            let rows = &self.rows;
            candidates
                .into_par_iter()
                .filter_map(|index| {
                    let ranks = rank_row(&rows[index], query);
                    if ranks.values().any(|r| r.passed) {
                        Some(ProjectedRow { index, ranks })
                    } else {
                        None
                    }
                })
                .collect()
        };

        if !self.state.sorting.is_empty() {
            projected.sort_by(|a, b| self.compare_rows(a, b));
        }

        trace!(
            "Projection of {} rows in {}ms",
            projected.len(),
            start_time.elapsed().as_millis()
        );
        projected
    }

    #[cfg(test)]
    pub fn visible_rows(&self) -> Vec<&EnrichedRow> {
        self.projection()
            .into_iter()
            .map(|p| &self.rows[p.index])
            .collect()
    }

    fn compare_rows(&self, a: &ProjectedRow, b: &ProjectedRow) -> Ordering {
        for spec in self.state.sorting.iter() {
            let ord = self.compare_by(spec, a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn compare_by(&self, spec: &SortSpec, a: &ProjectedRow, b: &ProjectedRow) -> Ordering {
        if column(spec.column).sorting == SortingKind::Fuzzy
            && let (Some(rank_a), Some(rank_b)) = (a.ranks.get(&spec.column), b.ranks.get(&spec.column))
        {
            let ord = compare_items(rank_a, rank_b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        let value_a = spec.column.value(&self.rows[a.index]);
        let value_b = spec.column.value(&self.rows[b.index]);
        compare_values(&value_a, &value_b, spec.direction)
    }
}

fn passes_filter(kind: FilterKind, value: CellValue<'_>, needle: &str) -> bool {
    let Some(text) = value.to_filter_string() else {
        return false;
    };
    let text = text.to_lowercase();
    match kind {
        FilterKind::Equals => text == needle,
        FilterKind::Includes => text.contains(needle),
    }
}

fn rank_row(row: &EnrichedRow, query: &str) -> HashMap<ColumnId, RankInfo> {
    COLUMNS
        .iter()
        .filter(|c| c.global_filter)
        .filter_map(|c| {
            c.id
                .value(row)
                .to_filter_string()
                .map(|text| (c.id, rank_item(&text, query)))
        })
        .collect()
}

// Missing values go last whatever the direction.
fn compare_values(a: &CellValue<'_>, b: &CellValue<'_>, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = match (a, b) {
                (CellValue::Number(x), CellValue::Number(y)) => x.total_cmp(y),
                _ => compare_alphanumeric(&a.to_string(), &b.to_string()),
            };
            direction.apply(ord)
        }
    }
}
