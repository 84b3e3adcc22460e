//! Pure helpers for sheet naming, run planning, and data-block location.

use std::io;
use std::sync::LazyLock;

use regex::Regex;

use crate::conf::{C_PATTERN_IDENTIFIER, N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::grid::SheetGrid;

////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MergePlanning

/// Contiguous runs `(row_start, row_end)` of equal non-empty values longer than one.
///
/// Indices are positions in `values`, both ends inclusive.
pub fn plan_contiguous_value_runs(values: &[String]) -> Vec<(usize, usize)> {
    let mut l_runs = Vec::new();
    let n_rows = values.len();

    let mut n_idx_start = 0;
    while n_idx_start < n_rows {
        let c_val_current = &values[n_idx_start];
        if c_val_current.is_empty() {
            n_idx_start += 1;
            continue;
        }

        let mut n_idx_next = n_idx_start + 1;
        while n_idx_next < n_rows && values[n_idx_next] == *c_val_current {
            n_idx_next += 1;
        }

        if n_idx_next - n_idx_start > 1 {
            l_runs.push((n_idx_start, n_idx_next - 1));
        }
        n_idx_start = n_idx_next;
    }

    l_runs
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataBlock

static RE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(C_PATTERN_IDENTIFIER).expect("valid identifier regex"));

/// Whether `text` is a `"<n>-<n>-<n>"` hierarchical identifier.
pub fn is_identifier_text(text: &str) -> bool {
    RE_IDENTIFIER.is_match(text.trim())
}

fn is_identifier_row(grid: &SheetGrid, row: usize, idx_col_key: Option<usize>) -> bool {
    idx_col_key.is_some_and(|col| is_identifier_text(&grid.get_text(row, col)))
}

/// Zero-based data origin.
///
/// First row whose column-1 cell is blank or whose key cell holds an identifier.
pub fn locate_data_origin(grid: &SheetGrid, idx_col_key: Option<usize>) -> usize {
    let mut row = 0;
    while !is_identifier_row(grid, row, idx_col_key) && !grid.is_blank(row, 0) {
        row += 1;
    }
    row
}

/// Exclusive end row of the data block that starts at `row_origin`.
pub fn locate_data_block_end(
    grid: &SheetGrid,
    row_origin: usize,
    idx_col_key: Option<usize>,
) -> usize {
    let mut row = row_origin;
    while is_identifier_row(grid, row, idx_col_key) || !grid.is_blank(row, 0) {
        row += 1;
    }
    row
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileSystem

/// Whether an IO error means another process holds the file.
pub fn is_file_in_use(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnumCellStyle, EnumCellValue};

    fn derive_values(l_vals: &[&str]) -> Vec<String> {
        l_vals.iter().map(|c_val| c_val.to_string()).collect()
    }

    fn derive_grid(l_col_1: &[&str]) -> SheetGrid {
        let mut grid = SheetGrid::new("S");
        for (row, c_val) in l_col_1.iter().enumerate() {
            if !c_val.is_empty() {
                grid.set(
                    row,
                    0,
                    EnumCellValue::String(c_val.to_string()),
                    EnumCellStyle::Raw,
                );
            }
        }
        grid
    }

    #[test]
    fn runs_merge_only_contiguous_repeats() {
        let l_values = derive_values(&["A", "A", "B", "B", "B", "C"]);
        assert_eq!(plan_contiguous_value_runs(&l_values), vec![(0, 1), (2, 4)]);

        let l_values = derive_values(&["A", "B", "A"]);
        assert!(plan_contiguous_value_runs(&l_values).is_empty());
    }

    #[test]
    fn runs_skip_empty_values() {
        let l_values = derive_values(&["", "", "X", "X", "", "X"]);
        assert_eq!(plan_contiguous_value_runs(&l_values), vec![(2, 3)]);
        assert!(plan_contiguous_value_runs(&[]).is_empty());
    }

    #[test]
    fn sanitize_sheet_name_replaces_and_truncates() {
        assert_eq!(sanitize_sheet_name("a/b:c", "_"), "a_b_c");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").chars().count(), 31);
    }

    #[test]
    fn origin_stops_at_blank_or_identifier() {
        let grid = derive_grid(&["Title", "NO", "1-1-1", "1-1-2"]);
        assert_eq!(locate_data_origin(&grid, Some(0)), 2);
        assert_eq!(locate_data_block_end(&grid, 2, Some(0)), 4);

        let grid = derive_grid(&["NO", "", "stale"]);
        assert_eq!(locate_data_origin(&grid, Some(0)), 1);
        assert_eq!(locate_data_block_end(&grid, 1, Some(0)), 1);

        let grid = derive_grid(&[]);
        assert_eq!(locate_data_origin(&grid, Some(0)), 0);
    }

    #[test]
    fn origin_without_key_column_uses_blank_only() {
        let grid = derive_grid(&["NO", "1-1-1", "", "x"]);
        assert_eq!(locate_data_origin(&grid, None), 2);
    }

    #[test]
    fn identifier_shape() {
        assert!(is_identifier_text(" 12-3-40 "));
        assert!(!is_identifier_text("1-1"));
        assert!(!is_identifier_text("NO"));
    }

    #[test]
    fn in_use_kinds() {
        assert!(is_file_in_use(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_file_in_use(&io::Error::from(io::ErrorKind::NotFound)));
    }
}
