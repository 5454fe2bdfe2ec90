//! Grid arrangement of rendered panels.
//!
//! Arrangement is pure bookkeeping; geometry only comes in through
//! [`LayoutGrid::cells`], so the grid can be checked without a terminal.

use ratatui::layout::Constraint;
use ratatui::layout::Layout;
use ratatui::layout::Rect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutGrid<T> {
    rows: Vec<Vec<T>>,
    columns: usize,
}

impl<T> LayoutGrid<T> {
    /// Slice `panels` row-major into `ceil(len / row_count)` columns. A
    /// `row_count` of 0 is treated as 1 and rows with no panels are dropped.
    pub fn arrange(panels: Vec<T>, row_count: usize) -> Self {
        let row_count = row_count.max(1);
        let columns = panels.len().div_ceil(row_count);
        if columns == 0 {
            return Self {
                rows: Vec::new(),
                columns,
            };
        }

        let mut rows: Vec<Vec<T>> = Vec::with_capacity(row_count);
        let mut remaining = panels.into_iter().peekable();
        while remaining.peek().is_some() {
            rows.push(remaining.by_ref().take(columns).collect());
        }
        Self { rows, columns }
    }

    pub fn rows(&self) -> &[Vec<T>] {
        &self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Split `area` into one rectangle per panel, same shape as [`Self::rows`].
    /// Rows share the height evenly; each row shares its width evenly among
    /// its own panels.
    pub fn cells(&self, area: Rect) -> Vec<Vec<Rect>> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        let row_areas = Layout::vertical(self.rows.iter().map(|_| Constraint::Fill(1))).split(area);
        self.rows
            .iter()
            .zip(row_areas.iter())
            .map(|(row, row_area)| {
                Layout::horizontal(row.iter().map(|_| Constraint::Fill(1)))
                    .split(*row_area)
                    .to_vec()
            })
            .collect()
    }

    /// Pair every panel with its rectangle, row-major.
    pub fn placements(&self, area: Rect) -> impl Iterator<Item = (&T, Rect)> {
        self.rows
            .iter()
            .flatten()
            .zip(self.cells(area).into_iter().flatten())
    }
}
