use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Cell, CellRef, CellValue, MergedRegion, MergedRegions, Range, EXCEL_MAX_ROWS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("row {row} is outside the worksheet (1..=1048576)")]
    RowOutOfBounds { row: u32 },
    #[error("inserting {count} rows at row {at} would push row {last_row} past the last worksheet row")]
    RowOverflow { at: u32, count: u32, last_row: u32 },
}

/// Formatting carried by a `<row>` element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowProperties {
    /// Row height in points (`ht`). `None` means the sheet default.
    pub height: Option<f64>,
    pub custom_height: bool,
    pub hidden: bool,
    /// Row-level style (`s`), only meaningful with `custom_format`.
    pub style_id: Option<u32>,
    pub custom_format: bool,
    /// Remaining `<row>` attributes (`outlineLevel`, `x14ac:dyDescent`, ...), written back
    /// verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_attrs: Vec<(String, String)>,
}

impl RowProperties {
    /// Hidden rows and rows squeezed to zero height are both invisible in Excel.
    pub fn is_zero_height(&self) -> bool {
        self.hidden || self.height.is_some_and(|h| h <= 0.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub props: RowProperties,
    /// Cells keyed by 1-indexed column.
    pub cells: BTreeMap<u32, Cell>,
}

impl Row {
    /// A copy of this row's formatting with every value stripped.
    fn style_template(&self) -> Row {
        Row {
            props: self.props.clone(),
            cells: self
                .cells
                .iter()
                .filter(|(_, cell)| cell.style_id.is_some())
                .map(|(col, cell)| (*col, Cell::styled(cell.style_id)))
                .collect(),
        }
    }
}

/// The primary worksheet of a template, loaded into memory for filling.
///
/// Rows are sparse and 1-indexed. Merged regions are kept alongside the cells so
/// structural edits keep both consistent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentGrid {
    rows: BTreeMap<u32, Row>,
    merges: MergedRegions,
}

impl DocumentGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> impl Iterator<Item = (u32, &Row)> {
        self.rows.iter().map(|(r, row)| (*r, row))
    }

    pub fn row(&self, row: u32) -> Option<&Row> {
        self.rows.get(&row)
    }

    /// Mutable access to a row, creating an empty one when absent.
    pub fn row_mut(&mut self, row: u32) -> &mut Row {
        self.rows.entry(row).or_default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Highest row number that has a `<row>` element or is covered by a merge.
    pub fn last_row(&self) -> Option<u32> {
        let last_data_row = self.rows.keys().next_back().copied();
        let last_merge_row = self.merges.iter().map(|m| m.last_row).max();
        last_data_row.max(last_merge_row)
    }

    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        self.rows.get(&at.row)?.cells.get(&at.col)
    }

    pub fn value(&self, at: CellRef) -> Option<&CellValue> {
        self.cell(at).map(|c| &c.value)
    }

    pub fn set_cell(&mut self, at: CellRef, cell: Cell) {
        self.row_mut(at.row).cells.insert(at.col, cell);
    }

    pub fn merges(&self) -> &MergedRegions {
        &self.merges
    }

    pub fn add_merge(&mut self, region: MergedRegion) {
        self.merges.push(region);
    }

    /// Resolve a coordinate to the anchor of its merged region (or itself).
    pub fn anchor_of(&self, at: CellRef) -> CellRef {
        self.merges.anchor_of(at.row, at.col)
    }

    /// Replace the cell at `at` with a plain text cell, keeping the previous cell's
    /// style. Any formula or shared-string link is dropped.
    pub fn set_text_preserving_style(&mut self, at: CellRef, text: impl Into<String>) {
        let style_id = self.cell(at).and_then(|c| c.style_id);
        self.set_cell(
            at,
            Cell {
                style_id,
                ..Cell::new(CellValue::Text(text.into()))
            },
        );
    }

    /// Make a hidden or zero-height row visible again. Returns true if the row changed.
    pub fn unhide_row(&mut self, row: u32) -> bool {
        let Some(props) = self.rows.get_mut(&row).map(|r| &mut r.props) else {
            return false;
        };
        if !props.is_zero_height() {
            return false;
        }
        props.hidden = false;
        if props.height.is_some_and(|h| h <= 0.0) {
            props.height = None;
            props.custom_height = false;
        }
        true
    }

    /// Bounding range of every stored cell, used for the `<dimension>` element.
    pub fn used_range(&self) -> Option<Range> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (row, r) in &self.rows {
            let (Some(first), Some(last)) = (r.cells.keys().next(), r.cells.keys().next_back())
            else {
                continue;
            };
            bounds = Some(match bounds {
                None => (*row, *row, *first, *last),
                Some((r0, r1, c0, c1)) => (r0.min(*row), r1.max(*row), c0.min(*first), c1.max(*last)),
            });
        }
        bounds.map(|(r0, r1, c0, c1)| Range::new(CellRef::new(r0, c0), CellRef::new(r1, c1)))
    }

    /// Snapshot of every text cell, in row-major order.
    pub fn text_cells(&self) -> Vec<(CellRef, String)> {
        self.rows
            .iter()
            .flat_map(|(row, r)| {
                r.cells.iter().filter_map(move |(col, cell)| {
                    cell.text().map(|t| (CellRef::new(*row, *col), t.to_string()))
                })
            })
            .collect()
    }

    /// Insert `count` empty rows so the first new row is `at`.
    ///
    /// - rows at or below `at` move down by `count`;
    /// - merges starting at or below `at` move down, merges straddling `at` grow;
    /// - each new row copies the height, row formatting, and per-cell styles of
    ///   `source_row` (numbered as before the insertion), plus its single-row merges;
    /// - row references at or below `at` in every formula and shared/array `ref` range
    ///   move down by `count`.
    ///
    /// New rows start empty apart from the copied styles: label text in the source row
    /// (such as `Speaker 2`) and its formulas are not copied, so callers write any labels
    /// the new rows need.
    pub fn insert_rows(&mut self, at: u32, count: u32, source_row: u32) -> Result<(), GridError> {
        if count == 0 {
            return Ok(());
        }
        for row in [at, source_row] {
            if row == 0 || row > EXCEL_MAX_ROWS {
                return Err(GridError::RowOutOfBounds { row });
            }
        }
        // Rows above `at` never move, but the new block itself must still fit.
        let last_row = self.last_row().unwrap_or(0).max(at - 1);
        if last_row.checked_add(count).map_or(true, |r| r > EXCEL_MAX_ROWS) {
            return Err(GridError::RowOverflow { at, count, last_row });
        }

        let template = self.rows.get(&source_row).map(Row::style_template);
        let source_after = if source_row >= at { source_row + count } else { source_row };

        let tail = self.rows.split_off(&at);
        self.rows
            .extend(tail.into_iter().map(|(row, r)| (row + count, r)));
        for formula in self
            .rows
            .values_mut()
            .flat_map(|r| r.cells.values_mut())
            .filter_map(|cell| cell.formula.as_mut())
        {
            formula.shift_rows(at, count);
        }

        for region in self.merges.iter_mut() {
            if region.first_row >= at {
                region.first_row += count;
                region.last_row += count;
            } else if region.last_row >= at {
                region.last_row += count;
            }
        }

        let source_merges: Vec<MergedRegion> = self
            .merges
            .iter()
            .filter(|m| m.is_single_row() && m.first_row == source_after)
            .copied()
            .collect();
        for offset in 0..count {
            let row = at + offset;
            for m in &source_merges {
                self.merges
                    .push(MergedRegion::new(row, row, m.first_col, m.last_col));
            }
            if let Some(template) = &template {
                self.rows.insert(row, template.clone());
            }
        }

        Ok(())
    }
}
