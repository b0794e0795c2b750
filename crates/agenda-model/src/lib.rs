//! `agenda-model` defines the in-memory worksheet grid that agenda templates are
//! loaded into before they are filled.
//!
//! Coordinates are **1-indexed** throughout (row `1` / column `1` is `A1`), matching
//! the coordinates emitted by the template analysis service. The grid is owned by a
//! single generation request and mutated in place:
//! - cell writes that preserve the previous cell's style
//! - merged-region anchor resolution
//! - row insertion that shifts rows, merged regions and formula references and clones
//!   the source row's height and styles

mod address;
mod cell;
mod grid;
mod merge;
mod rewrite;
mod value;

pub use address::{A1ParseError, CellRef, Range, RangeParseError};
pub use cell::{Cell, Formula, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
pub use grid::{DocumentGrid, GridError, Row, RowProperties};
pub use merge::{MergedRegion, MergedRegions};
pub use rewrite::shift_formula_rows;
pub use value::CellValue;
