//! In-memory sheet model shared by fresh and template layouts.

use std::collections::{BTreeMap, BTreeSet};

use crate::spec::{EnumCellStyle, EnumCellValue, SpecMergeRange};

/// One populated cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecGridCell {
    /// Cell value.
    pub value: EnumCellValue,
    /// Style slot resolved on emit.
    pub style: EnumCellStyle,
}

/// Sparse worksheet: zero-based `(row, col)` cells plus merges and sizes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetGrid {
    /// Sheet name.
    pub name: String,
    /// Populated cells.
    pub cells: BTreeMap<(usize, usize), SpecGridCell>,
    /// Merged ranges; never overlapping.
    pub merges: Vec<SpecMergeRange>,
    /// Column widths in character units.
    pub widths: BTreeMap<usize, f64>,
    /// Row heights in points.
    pub heights: BTreeMap<usize, f64>,
}

impl SheetGrid {
    /// Empty sheet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Value at `(row, col)`, if populated.
    pub fn get_value(&self, row: usize, col: usize) -> Option<&EnumCellValue> {
        self.cells.get(&(row, col)).map(|cell| &cell.value)
    }

    /// Text at `(row, col)`; empty for unpopulated cells.
    pub fn get_text(&self, row: usize, col: usize) -> String {
        self.get_value(row, col)
            .map(EnumCellValue::to_text)
            .unwrap_or_default()
    }

    /// Whether `(row, col)` is unpopulated or blank.
    pub fn is_blank(&self, row: usize, col: usize) -> bool {
        self.get_value(row, col)
            .is_none_or(EnumCellValue::is_blank)
    }

    /// Populate `(row, col)`, replacing any previous cell.
    pub fn set(&mut self, row: usize, col: usize, value: EnumCellValue, style: EnumCellStyle) {
        self.cells.insert((row, col), SpecGridCell { value, style });
    }

    /// Remove every cell in the inclusive block and any merge touching it.
    pub fn clear_block(
        &mut self,
        row_start: usize,
        row_end: usize,
        col_start: usize,
        col_end: usize,
    ) {
        if row_start > row_end || col_start > col_end {
            return;
        }
        self.cells.retain(|&(row, col), _| {
            !(row_start..=row_end).contains(&row) || !(col_start..=col_end).contains(&col)
        });
        self.merges
            .retain(|merge| !merge.intersects(row_start, row_end, col_start, col_end));
    }

    /// Zero-based index of the last populated row.
    pub fn max_row(&self) -> Option<usize> {
        self.cells.keys().map(|&(row, _)| row).max()
    }

    /// Cells covered by a merge, anchors included.
    pub fn derive_merge_tracker(&self) -> BTreeSet<(usize, usize)> {
        let mut set_covered = BTreeSet::new();
        for merge in &self.merges {
            for row in merge.row_start..=merge.row_end {
                for col in merge.col_start..=merge.col_end {
                    set_covered.insert((row, col));
                }
            }
        }
        set_covered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive_text(c_text: &str) -> EnumCellValue {
        EnumCellValue::String(c_text.to_string())
    }

    #[test]
    fn clear_block_drops_cells_and_touching_merges() {
        let mut grid = SheetGrid::new("S");
        for row in 0..4 {
            for col in 0..3 {
                grid.set(row, col, derive_text("x"), EnumCellStyle::Raw);
            }
        }
        grid.merges.push(SpecMergeRange {
            row_start: 0,
            row_end: 0,
            col_start: 0,
            col_end: 2,
            value: derive_text("title"),
            style: EnumCellStyle::Raw,
        });
        grid.merges.push(SpecMergeRange {
            row_start: 2,
            row_end: 3,
            col_start: 1,
            col_end: 1,
            value: derive_text("x"),
            style: EnumCellStyle::Raw,
        });

        grid.clear_block(1, 3, 0, 1);

        assert!(grid.is_blank(1, 0));
        assert!(grid.is_blank(3, 1));
        assert!(!grid.is_blank(3, 2));
        assert!(!grid.is_blank(0, 0));
        assert_eq!(grid.merges.len(), 1);
        assert_eq!(grid.merges[0].row_start, 0);
    }

    #[test]
    fn blank_and_text_lookup() {
        let mut grid = SheetGrid::new("S");
        grid.set(0, 0, derive_text("  "), EnumCellStyle::Raw);
        grid.set(1, 0, EnumCellValue::Number(3.0), EnumCellStyle::Raw);

        assert!(grid.is_blank(0, 0));
        assert!(grid.is_blank(5, 5));
        assert!(!grid.is_blank(1, 0));
        assert_eq!(grid.get_text(1, 0), "3");
        assert_eq!(grid.max_row(), Some(1));
    }
}
