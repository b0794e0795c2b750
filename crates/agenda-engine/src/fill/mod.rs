//! Writing agenda data into a template grid.
//!
//! Two strategies: [`fill_by_coordinates`] when the template has a role mapping, and
//! [`fill_by_labels`] as the heuristic fallback.

mod coordinates;
mod labels;

pub use coordinates::fill_by_coordinates;
pub use labels::{fill_by_labels, substitute_placeholders};

/// Cells written and mappings (or label hits) that produced no write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FillReport {
    pub written: usize,
    pub skipped: usize,
}
