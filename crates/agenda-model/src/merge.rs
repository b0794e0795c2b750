use serde::{Deserialize, Serialize};

use crate::{CellRef, Range};

/// A merged rectangle of cells (`<mergeCell ref="...">`), 1-indexed and inclusive.
///
/// Only the top-left cell (the anchor) holds a value; every coordinate inside the
/// region resolves to the anchor for reads and writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergedRegion {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

impl MergedRegion {
    pub fn new(first_row: u32, last_row: u32, first_col: u32, last_col: u32) -> Self {
        Self {
            first_row: first_row.min(last_row),
            last_row: first_row.max(last_row),
            first_col: first_col.min(last_col),
            last_col: first_col.max(last_col),
        }
    }

    #[inline]
    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    #[inline]
    pub fn anchor(&self) -> CellRef {
        CellRef::new(self.first_row, self.first_col)
    }

    #[inline]
    pub fn is_single_row(&self) -> bool {
        self.first_row == self.last_row
    }

    pub fn to_range(self) -> Range {
        Range::new(
            CellRef::new(self.first_row, self.first_col),
            CellRef::new(self.last_row, self.last_col),
        )
    }
}

impl From<Range> for MergedRegion {
    fn from(range: Range) -> Self {
        Self::new(range.start.row, range.end.row, range.start.col, range.end.col)
    }
}

/// The set of merged regions on a worksheet, in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRegions {
    regions: Vec<MergedRegion>,
}

impl MergedRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedRegion> {
        self.regions.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut MergedRegion> {
        self.regions.iter_mut()
    }

    /// Add a region. Single-cell regions are meaningless and ignored.
    pub fn push(&mut self, region: MergedRegion) {
        if region.first_row == region.last_row && region.first_col == region.last_col {
            return;
        }
        self.regions.push(region);
    }

    /// The region containing `(row, col)`, if any. The first region wins when a
    /// malformed sheet declares overlapping merges.
    pub fn containing(&self, row: u32, col: u32) -> Option<&MergedRegion> {
        self.regions.iter().find(|r| r.contains(row, col))
    }

    /// Resolve a coordinate to the cell that actually stores its value.
    pub fn anchor_of(&self, row: u32, col: u32) -> CellRef {
        self.containing(row, col)
            .map(MergedRegion::anchor)
            .unwrap_or(CellRef::new(row, col))
    }
}

impl FromIterator<MergedRegion> for MergedRegions {
    fn from_iter<T: IntoIterator<Item = MergedRegion>>(iter: T) -> Self {
        let mut out = MergedRegions::new();
        for region in iter {
            out.push(region);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    const CASES: u32 = 256;

    #[test]
    fn region_from_range_normalizes() {
        let range = Range::from_a1("D7:B3").unwrap();
        let region = MergedRegion::from(range);
        assert_eq!(region, MergedRegion::new(3, 7, 2, 4));
        assert_eq!(region.to_range().to_string(), "B3:D7");
    }

    #[test]
    fn single_cell_merges_are_dropped() {
        let mut merges = MergedRegions::new();
        merges.push(MergedRegion::new(2, 2, 2, 2));
        assert!(merges.is_empty());
    }

    #[test]
    fn coordinates_outside_any_region_resolve_to_themselves() {
        let merges: MergedRegions = [MergedRegion::new(2, 3, 2, 4)].into_iter().collect();
        assert_eq!(merges.anchor_of(1, 1), CellRef::new(1, 1));
        assert_eq!(merges.anchor_of(4, 2), CellRef::new(4, 2));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: CASES, ..ProptestConfig::default() })]

        #[test]
        fn every_interior_coordinate_resolves_to_the_anchor(
            first_row in 1u32..500,
            first_col in 1u32..200,
            height in 0u32..20,
            width in 0u32..20,
            dr in 0u32..20,
            dc in 0u32..20,
        ) {
            prop_assume!(height > 0 || width > 0);
            let region = MergedRegion::new(first_row, first_row + height, first_col, first_col + width);
            let merges: MergedRegions = [region].into_iter().collect();

            let row = first_row + dr.min(height);
            let col = first_col + dc.min(width);
            prop_assert_eq!(merges.anchor_of(row, col), CellRef::new(first_row, first_col));
        }
    }
}
