//! Template workbook loading into sheet grids.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};
use tracing::debug;

use crate::grid::SheetGrid;
use crate::spec::{EnumCellStyle, EnumCellValue, SpecMergeRange, XlsxLayoutError};

/// Read one template sheet's values and merged ranges.
///
/// Only what the layout scans is loaded; formatting stays in the package and is
/// preserved by the in-place patch. Formula cells yield their cached value.
pub fn read_sheet_grid(path: &Path, sheet_name: &str) -> Result<SheetGrid, XlsxLayoutError> {
    let derive_err = |source: calamine::XlsxError| XlsxLayoutError::TemplateRead {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook: Xlsx<BufReader<File>> = open_workbook(path).map_err(derive_err)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet_name) {
        return Err(XlsxLayoutError::SheetNotFound {
            path: path.to_path_buf(),
            sheet_name: sheet_name.to_string(),
        });
    }
    workbook.load_merged_regions().map_err(derive_err)?;

    let range = workbook.worksheet_range(sheet_name).map_err(derive_err)?;
    let mut grid = SheetGrid::new(sheet_name);

    let (n_row_offset, n_col_offset) = range
        .start()
        .map(|(row, col)| (row as usize, col as usize))
        .unwrap_or((0, 0));
    for (row, col, data) in range.used_cells() {
        let value = convert_calamine_value(data);
        if value == EnumCellValue::None {
            continue;
        }
        grid.set(
            n_row_offset + row,
            n_col_offset + col,
            value,
            EnumCellStyle::Raw,
        );
    }

    let l_dims = workbook
        .worksheet_merge_cells(sheet_name)
        .transpose()
        .map_err(derive_err)?
        .unwrap_or_default();
    for dims in l_dims {
        if dims.start == dims.end {
            continue;
        }
        let (row_start, col_start) = (dims.start.0 as usize, dims.start.1 as usize);
        let value = grid
            .get_value(row_start, col_start)
            .cloned()
            .unwrap_or(EnumCellValue::None);
        grid.merges.push(SpecMergeRange {
            row_start,
            row_end: dims.end.0 as usize,
            col_start,
            col_end: dims.end.1 as usize,
            value,
            style: EnumCellStyle::Raw,
        });
    }

    debug!(
        sheet = %grid.name,
        n_cells = grid.cells.len(),
        n_merges = grid.merges.len(),
        "read template sheet"
    );
    Ok(grid)
}

/// Normalize one calamine cell; booleans become `"True"`/`"False"` text.
pub fn convert_calamine_value(data: &Data) -> EnumCellValue {
    match data {
        Data::Empty => EnumCellValue::None,
        Data::String(val) => EnumCellValue::String(val.clone()),
        Data::Float(val) => EnumCellValue::Number(*val),
        Data::Int(val) => EnumCellValue::Number(*val as f64),
        Data::Bool(val) => EnumCellValue::String(if *val { "True" } else { "False" }.to_string()),
        Data::DateTime(val) => EnumCellValue::DateTime(val.as_f64()),
        Data::DateTimeIso(val) | Data::DurationIso(val) => EnumCellValue::String(val.clone()),
        Data::Error(err) => EnumCellValue::String(format!("#{err:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calamine_values_are_normalized() {
        assert_eq!(convert_calamine_value(&Data::Empty), EnumCellValue::None);
        assert_eq!(
            convert_calamine_value(&Data::Int(3)),
            EnumCellValue::Number(3.0)
        );
        assert_eq!(
            convert_calamine_value(&Data::Bool(true)),
            EnumCellValue::String("True".to_string())
        );
        assert_eq!(
            convert_calamine_value(&Data::String("済".to_string())),
            EnumCellValue::String("済".to_string())
        );
    }

    #[test]
    fn unreadable_template_is_reported() {
        let dir_tmp = tempfile::tempdir().unwrap();
        let path_bad = dir_tmp.path().join("bad.xlsx");
        std::fs::write(&path_bad, b"not a zip").unwrap();

        let err = read_sheet_grid(&path_bad, "S").unwrap_err();
        assert!(matches!(err, XlsxLayoutError::TemplateRead { .. }));
    }

    #[test]
    fn sheet_values_and_merges_are_read() {
        let dir_tmp = tempfile::tempdir().unwrap();
        let path_book = dir_tmp.path().join("book.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("S").unwrap();
        sheet
            .merge_range(0, 0, 0, 2, "Title", &rust_xlsxwriter::Format::new())
            .unwrap();
        sheet.write_number(2, 1, 7.0).unwrap();
        workbook.save(&path_book).unwrap();

        let grid = read_sheet_grid(&path_book, "S").unwrap();
        assert_eq!(grid.get_text(0, 0), "Title");
        assert_eq!(grid.get_value(2, 1), Some(&EnumCellValue::Number(7.0)));
        assert_eq!(grid.merges.len(), 1);
        assert_eq!(grid.merges[0].col_end, 2);

        let err = read_sheet_grid(&path_book, "Missing").unwrap_err();
        assert!(matches!(err, XlsxLayoutError::SheetNotFound { .. }));
    }
}
