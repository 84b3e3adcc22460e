//! Layout kernel: places parsed rows into a fresh or templated sheet and saves the workbook.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use mdsheet_conf::{N_NCOLS_PRIMARY_MAX, SpecConvertConf, is_primary_column_count_supported};
use mdsheet_io_md::SpecCaseRow;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::conf::{N_ROW_ORIGIN_FRESH, derive_layout_formats, resolve_cell_format_spec};
use crate::grid::SheetGrid;
use crate::metric::{EastAsianTextExtent, TextExtentEstimator};
use crate::patch::patch_template_package;
use crate::spec::{
    EnumCellStyle, EnumCellValue, EnumLayoutMode, SpecCellFormat, SpecLayoutFormats,
    SpecLayoutOptions, SpecLayoutReport, SpecMergeRange, SpecSheetPatch, XlsxLayoutError,
};
use crate::template::read_sheet_grid;
use crate::util::{
    is_file_in_use, locate_data_block_end, locate_data_origin, plan_contiguous_value_runs,
    sanitize_sheet_name,
};

/// Auxiliary values of one previous data row, keyed by its identifier.
type AuxSnapshot = BTreeMap<String, Vec<EnumCellValue>>;

/// Outcome of the shared layout pipeline over one sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecLayoutStats {
    /// Rows whose auxiliary values were restored.
    pub n_rows_restored: usize,
    /// Merged ranges created over data rows.
    pub merges: Vec<SpecMergeRange>,
}

/// Configured workbook layout writer.
///
/// One writer can render any number of outputs; each [`Self::render`] call writes the
/// destination exactly once, after the whole workbook has been assembled.
pub struct XlsxLayoutWriter {
    cfg_conf: SpecConvertConf,
    formats: SpecLayoutFormats,
    estimator: Box<dyn TextExtentEstimator>,
}

impl XlsxLayoutWriter {
    /// Create a writer; fails before any I/O when more than 26 primary columns are configured.
    pub fn new(conf: SpecConvertConf) -> Result<Self, XlsxLayoutError> {
        let n_columns = conf.columns.len();
        if !is_primary_column_count_supported(n_columns) {
            return Err(XlsxLayoutError::TooManyColumns {
                n_columns,
                n_max: N_NCOLS_PRIMARY_MAX,
            });
        }

        let estimator =
            EastAsianTextExtent::new(conf.excel_settings.font_size, conf.autofit.clone());
        Ok(Self {
            formats: derive_layout_formats(&conf),
            cfg_conf: conf,
            estimator: Box::new(estimator),
        })
    }

    /// Replace the width/height estimation strategy.
    pub fn with_estimator(mut self, estimator: impl TextExtentEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    /// Active configuration.
    pub fn conf(&self) -> &SpecConvertConf {
        &self.cfg_conf
    }

    /// Lay out `rows` and save the workbook to `path_file_out`.
    pub fn render(
        &self,
        rows: &[SpecCaseRow],
        path_file_out: &Path,
        options: &SpecLayoutOptions,
    ) -> Result<SpecLayoutReport, XlsxLayoutError> {
        let c_sheet_name_conf = self.cfg_conf.sheet_name(options.sheet_variant);
        let c_sheet_name = sanitize_sheet_name(c_sheet_name_conf, "_");

        let mut report = SpecLayoutReport {
            path_file_out: path_file_out.to_path_buf(),
            sheet_name: c_sheet_name.clone(),
            mode: EnumLayoutMode::Fresh,
            row_origin: N_ROW_ORIGIN_FRESH,
            n_rows_written: rows.len(),
            n_rows_restored: 0,
            merges: Vec::new(),
            warnings: Vec::new(),
        };
        if c_sheet_name != c_sheet_name_conf {
            report.warn(format!(
                "Sheet name {c_sheet_name_conf:?} was sanitized to {c_sheet_name:?}."
            ));
        }

        let path_template = match &options.path_template {
            Some(path) if path.is_file() => Some(path.as_path()),
            Some(path) => {
                warn!(path = %path.display(), "template not found; creating a fresh workbook");
                report.warn(format!(
                    "Template {} not found; created a fresh workbook.",
                    path.display()
                ));
                None
            }
            None => None,
        };

        let v_bytes = match path_template {
            None => {
                info!(sheet = %c_sheet_name, n_rows = rows.len(), "laying out fresh sheet");
                let mut grid = SheetGrid::new(c_sheet_name.as_str());
                let stats = self.plan_fresh_rows(&mut grid, rows, options);
                report.merges = stats.merges;
                self.emit_workbook(&grid)
                    .and_then(|mut workbook| workbook.save_to_buffer())
                    .map_err(|err| derive_save_error(path_file_out, err))?
            }
            Some(path_template) => {
                report.mode = EnumLayoutMode::Template;
                info!(
                    sheet = %c_sheet_name,
                    template = %path_template.display(),
                    n_rows = rows.len(),
                    "laying out template sheet"
                );
                let mut grid = read_sheet_grid(path_template, &c_sheet_name)?;
                let patch = self.plan_template_sheet(&mut grid, rows, options, &mut report);
                patch_template_package(path_template, &patch, &self.formats)?
            }
        };

        persist_workbook(path_file_out, &v_bytes)?;

        info!(path = %path_file_out.display(), "{}", report.format("saved workbook:"));
        Ok(report)
    }

    /// Build a fresh sheet in memory with header, rows, sizes, and merges applied.
    pub fn plan_fresh_sheet(
        &self,
        rows: &[SpecCaseRow],
        sheet_name: &str,
        options: &SpecLayoutOptions,
    ) -> (SheetGrid, SpecLayoutStats) {
        let mut grid = SheetGrid::new(sheet_name);
        let stats = self.plan_fresh_rows(&mut grid, rows, options);
        (grid, stats)
    }

    fn plan_fresh_rows(
        &self,
        grid: &mut SheetGrid,
        rows: &[SpecCaseRow],
        options: &SpecLayoutOptions,
    ) -> SpecLayoutStats {
        self.write_header_row(grid, 0);
        self.apply_layout(grid, rows, N_ROW_ORIGIN_FRESH - 1, &AuxSnapshot::new(), options)
    }

    ////////////////////////////////////////////////////////////////////////////
    // #region TemplateMode

    /// Replace the data block of a template sheet in memory and describe the rewrite.
    ///
    /// Rows above the data origin are left as they are; the returned patch covers
    /// the header row when one had to be added, the old block, and the new rows.
    pub fn plan_template_sheet(
        &self,
        grid: &mut SheetGrid,
        rows: &[SpecCaseRow],
        options: &SpecLayoutOptions,
        report: &mut SpecLayoutReport,
    ) -> SpecSheetPatch {
        let idx_col_key = self.cfg_conf.key_column_index();
        let mut row_origin = locate_data_origin(grid, idx_col_key);
        let row_block_end = locate_data_block_end(grid, row_origin, idx_col_key);
        debug!(row_origin, row_block_end, "located previous data block");

        let dict_snapshot = if !options.if_preserve_auxiliary_columns {
            AuxSnapshot::new()
        } else if let Some(idx_col_key) = idx_col_key {
            self.snapshot_auxiliary(grid, row_origin, row_block_end, idx_col_key)
        } else {
            warn!("no column is bound to `no`; auxiliary values are not preserved");
            report.warn("No key column configured; auxiliary values were not preserved.");
            AuxSnapshot::new()
        };

        let n_cols = self.n_cols_total();
        let n_col_end = n_cols.saturating_sub(1);
        if row_block_end > row_origin {
            grid.clear_block(row_origin, row_block_end - 1, 0, n_col_end);
        }
        let row_patch_start = row_origin;
        if row_origin == 0 {
            self.write_header_row(grid, 0);
            row_origin = 1;
        }

        let n_row_data_end = row_origin + rows.len().max(1) - 1;
        grid.merges
            .retain(|merge| !merge.intersects(row_origin, n_row_data_end, 0, n_col_end));

        let stats = self.apply_layout(grid, rows, row_origin, &dict_snapshot, options);
        report.row_origin = row_origin + 1;
        report.n_rows_restored = stats.n_rows_restored;
        report.merges = stats.merges;
        if dict_snapshot.len() > stats.n_rows_restored {
            debug!(
                n_dropped = dict_snapshot.len() - stats.n_rows_restored,
                "auxiliary rows without a matching identifier were dropped"
            );
        }

        let row_patch_stop = row_block_end.max(row_origin + rows.len());
        SpecSheetPatch {
            sheet_name: grid.name.clone(),
            row_start: row_patch_start,
            row_stop: row_patch_stop,
            n_cols,
            cells: grid
                .cells
                .iter()
                .filter(|&(&(row, col), _)| {
                    (row_patch_start..row_patch_stop).contains(&row) && col < n_cols
                })
                .map(|(&key, cell)| (key, cell.clone()))
                .collect(),
            widths: grid.widths.clone(),
            heights: grid.heights.clone(),
            merges: grid.merges.clone(),
        }
    }

    fn snapshot_auxiliary(
        &self,
        grid: &SheetGrid,
        row_start: usize,
        row_end: usize,
        idx_col_key: usize,
    ) -> AuxSnapshot {
        let n_col_aux_start = self.cfg_conf.columns.len();
        let n_cols_aux = self.cfg_conf.auxiliary_columns.names.len();

        let mut dict_snapshot = AuxSnapshot::new();
        for row in row_start..row_end {
            let c_key = grid.get_text(row, idx_col_key).trim().to_string();
            if c_key.is_empty() {
                continue;
            }
            let l_values: Vec<EnumCellValue> = (n_col_aux_start..n_col_aux_start + n_cols_aux)
                .map(|col| {
                    grid.get_value(row, col)
                        .cloned()
                        .unwrap_or(EnumCellValue::None)
                })
                .collect();
            if l_values.iter().all(EnumCellValue::is_blank) {
                continue;
            }
            dict_snapshot.entry(c_key).or_insert(l_values);
        }

        debug!(n_rows = dict_snapshot.len(), "snapshotted auxiliary values");
        dict_snapshot
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region SharedPipeline

    fn n_cols_total(&self) -> usize {
        self.cfg_conf.columns.len() + self.cfg_conf.auxiliary_columns.names.len()
    }

    fn write_header_row(&self, grid: &mut SheetGrid, row: usize) {
        let l_names = self
            .cfg_conf
            .columns
            .iter()
            .map(|col| col.name.as_str())
            .chain(self.cfg_conf.auxiliary_columns.names.iter().map(String::as_str));
        for (col, c_name) in l_names.enumerate() {
            grid.set(
                row,
                col,
                EnumCellValue::String(c_name.to_string()),
                EnumCellStyle::Header,
            );
        }
    }

    fn apply_layout(
        &self,
        grid: &mut SheetGrid,
        rows: &[SpecCaseRow],
        row_origin: usize,
        dict_snapshot: &AuxSnapshot,
        options: &SpecLayoutOptions,
    ) -> SpecLayoutStats {
        let n_rows_restored = self.write_data_rows(grid, rows, row_origin, dict_snapshot);
        self.apply_column_widths(grid, rows.len(), row_origin, options.if_auto_width);
        if options.if_auto_height {
            self.apply_row_heights(grid, rows.len(), row_origin);
        }
        let merges = if options.if_merge_cells {
            self.apply_merges(grid, rows.len(), row_origin)
        } else {
            Vec::new()
        };

        SpecLayoutStats {
            n_rows_restored,
            merges,
        }
    }

    fn write_data_rows(
        &self,
        grid: &mut SheetGrid,
        rows: &[SpecCaseRow],
        row_origin: usize,
        dict_snapshot: &AuxSnapshot,
    ) -> usize {
        let n_cols_primary = self.cfg_conf.columns.len();
        let n_cols_aux = self.cfg_conf.auxiliary_columns.names.len();
        let mut n_rows_restored = 0;

        for (n_idx, row_case) in rows.iter().enumerate() {
            let row = row_origin + n_idx;
            for (col, cfg_col) in self.cfg_conf.columns.iter().enumerate() {
                let c_text = row_case.derive_cell_text(cfg_col.key);
                let value = if c_text.is_empty() {
                    EnumCellValue::None
                } else {
                    EnumCellValue::String(c_text)
                };
                grid.set(row, col, value, EnumCellStyle::Primary(col));
            }

            let l_restored = dict_snapshot.get(&row_case.identifier);
            if l_restored.is_some() {
                n_rows_restored += 1;
            }
            for n_idx_aux in 0..n_cols_aux {
                let value = l_restored
                    .and_then(|l_values| l_values.get(n_idx_aux))
                    .cloned()
                    .unwrap_or(EnumCellValue::None);
                grid.set(
                    row,
                    n_cols_primary + n_idx_aux,
                    value,
                    EnumCellStyle::Auxiliary,
                );
            }
            debug!(row, identifier = %row_case.identifier, "wrote data row");
        }

        n_rows_restored
    }

    fn apply_column_widths(
        &self,
        grid: &mut SheetGrid,
        n_rows: usize,
        row_origin: usize,
        if_auto_width: bool,
    ) {
        let cfg_autofit = &self.cfg_conf.autofit;
        let cfg_aux = &self.cfg_conf.auxiliary_columns;

        let l_columns = self
            .cfg_conf
            .columns
            .iter()
            .map(|col| (col.name.as_str(), col.width))
            .chain(cfg_aux.names.iter().map(|name| (name.as_str(), cfg_aux.width)));
        for (col, (c_header, n_width_conf)) in l_columns.enumerate() {
            let mut n_width = n_width_conf;
            if if_auto_width {
                let n_width_est = (row_origin..row_origin + n_rows)
                    .map(|row| self.estimator.estimate_width(&grid.get_text(row, col)))
                    .fold(self.estimator.estimate_width(c_header), f64::max)
                    .max(cfg_autofit.width_min)
                    .min(cfg_autofit.width_max);
                n_width = n_width.max(n_width_est);
            }
            grid.widths.insert(col, n_width);
        }
    }

    fn apply_row_heights(&self, grid: &mut SheetGrid, n_rows: usize, row_origin: usize) {
        let n_cols_total = self.n_cols_total();
        for row in row_origin..row_origin + n_rows {
            let n_lines = (0..n_cols_total)
                .map(|col| self.estimator.estimate_lines(&grid.get_text(row, col)))
                .max()
                .unwrap_or(1);
            grid.heights
                .insert(row, self.estimator.estimate_height(n_lines));
        }
    }

    fn apply_merges(
        &self,
        grid: &mut SheetGrid,
        n_rows: usize,
        row_origin: usize,
    ) -> Vec<SpecMergeRange> {
        let mut l_merges = Vec::new();
        for (col, cfg_col) in self.cfg_conf.columns.iter().enumerate() {
            if !cfg_col.merge {
                continue;
            }
            let l_values: Vec<String> = (row_origin..row_origin + n_rows)
                .map(|row| grid.get_text(row, col))
                .collect();
            for (n_idx_start, n_idx_end) in plan_contiguous_value_runs(&l_values) {
                let merge = SpecMergeRange {
                    row_start: row_origin + n_idx_start,
                    row_end: row_origin + n_idx_end,
                    col_start: col,
                    col_end: col,
                    value: EnumCellValue::String(l_values[n_idx_start].clone()),
                    style: EnumCellStyle::Primary(col),
                };
                for row in merge.row_start + 1..=merge.row_end {
                    grid.set(row, col, EnumCellValue::None, EnumCellStyle::Primary(col));
                }
                debug!(
                    col,
                    row_start = merge.row_start,
                    row_end = merge.row_end,
                    "planned merge"
                );
                l_merges.push(merge);
            }
        }

        grid.merges.extend(l_merges.iter().cloned());
        l_merges
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
    // #region Emit

    fn emit_workbook(&self, grid: &SheetGrid) -> Result<Workbook, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&grid.name)?;
        self.emit_sheet(worksheet, grid)?;
        Ok(workbook)
    }

    fn emit_sheet(&self, worksheet: &mut Worksheet, grid: &SheetGrid) -> Result<(), XlsxError> {
        for (&col, &n_width) in &grid.widths {
            worksheet.set_column_width(cast_col_num(col)?, n_width)?;
        }
        for (&row, &n_height) in &grid.heights {
            worksheet.set_row_height(cast_row_num(row)?, n_height)?;
        }

        for merge in &grid.merges {
            let format = self.derive_cell_format(merge.style, &merge.value);
            let c_text = match &merge.value {
                EnumCellValue::String(val) => val.as_str(),
                _ => "",
            };
            worksheet.merge_range(
                cast_row_num(merge.row_start)?,
                cast_col_num(merge.col_start)?,
                cast_row_num(merge.row_end)?,
                cast_col_num(merge.col_end)?,
                c_text,
                &format,
            )?;
            if let EnumCellValue::Number(val) | EnumCellValue::DateTime(val) = merge.value {
                worksheet.write_number_with_format(
                    cast_row_num(merge.row_start)?,
                    cast_col_num(merge.col_start)?,
                    val,
                    &format,
                )?;
            }
        }

        let dict_merge_tracker = grid.derive_merge_tracker();
        for (&(row, col), cell) in &grid.cells {
            if dict_merge_tracker.contains(&(row, col)) {
                continue;
            }
            let format = self.derive_cell_format(cell.style, &cell.value);
            write_cell_with_format(worksheet, row, col, &cell.value, &format)?;
        }

        Ok(())
    }

    fn derive_cell_format(&self, style: EnumCellStyle, value: &EnumCellValue) -> Format {
        derive_rust_xlsx_format(&resolve_cell_format_spec(&self.formats, style, value))
    }

    // #endregion
    ////////////////////////////////////////////////////////////////////////////
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), XlsxError> {
    let (row_num, col_num) = (cast_row_num(row_idx)?, cast_col_num(col_idx)?);
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(row_num, col_num, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(row_num, col_num, val, format)?;
        }
        EnumCellValue::Number(val) | EnumCellValue::DateTime(val) => {
            worksheet.write_number_with_format(row_num, col_num, *val, format)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "justify" => Some(FormatAlign::Justify),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" => Some(FormatAlign::VerticalCenter),
        "vjustify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, XlsxError> {
    u32::try_from(value).map_err(|_| XlsxError::RowColumnLimitError)
}

fn cast_col_num(value: usize) -> Result<u16, XlsxError> {
    u16::try_from(value).map_err(|_| XlsxError::RowColumnLimitError)
}

/// Write `bytes` to a sibling temporary file, then rename it over `path`.
///
/// The destination is either left untouched or fully replaced.
fn persist_workbook(path: &Path, bytes: &[u8]) -> Result<(), XlsxLayoutError> {
    let derive_err = |err: io::Error| {
        if is_file_in_use(&err) {
            XlsxLayoutError::FileInUse {
                path: path.to_path_buf(),
            }
        } else {
            XlsxLayoutError::WriteFailed {
                path: path.to_path_buf(),
                source: Box::new(err),
            }
        }
    };

    let path_dir = match path.parent() {
        Some(path_dir) if !path_dir.as_os_str().is_empty() => path_dir,
        _ => Path::new("."),
    };
    let mut file_tmp = NamedTempFile::new_in(path_dir).map_err(derive_err)?;
    file_tmp.write_all(bytes).map_err(derive_err)?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(file_tmp.path(), meta.permissions()).map_err(derive_err)?;
    }
    file_tmp.persist(path).map_err(|err| derive_err(err.error))?;
    debug!(path = %path.display(), n_bytes = bytes.len(), "persisted workbook");
    Ok(())
}

/// Classify a workbook assembly failure; a locked destination becomes [`XlsxLayoutError::FileInUse`].
fn derive_save_error(path: &Path, err: XlsxError) -> XlsxLayoutError {
    match err {
        XlsxError::IoError(io_err) if is_file_in_use(&io_err) => XlsxLayoutError::FileInUse {
            path: path.to_path_buf(),
        },
        other => XlsxLayoutError::WriteFailed {
            path: path.to_path_buf(),
            source: Box::new(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use mdsheet_conf::{EnumColumnKey, SpecColumnConf};

    use super::*;

    fn derive_row(c_id: &str, c_section: &str, c_subsection: &str, c_case: &str) -> SpecCaseRow {
        SpecCaseRow {
            identifier: c_id.to_string(),
            section: Some(c_section.to_string()),
            subsection: Some(c_subsection.to_string()),
            case_name: c_case.to_string(),
            steps: vec!["入力する".to_string(), "送信する".to_string()],
            expectations: vec!["成功".to_string()],
        }
    }

    fn derive_rows() -> Vec<SpecCaseRow> {
        vec![
            derive_row("1-1-1", "A", "x", "c1"),
            derive_row("1-1-2", "A", "x", "c2"),
            derive_row("2-1-1", "B", "y", "c3"),
            derive_row("2-2-1", "B", "z", "c4"),
            derive_row("2-3-1", "B", "w", "c5"),
            derive_row("3-1-1", "C", "v", "c6"),
        ]
    }

    #[test]
    fn too_many_columns_fails_at_construction() {
        let mut cfg_conf = SpecConvertConf::default();
        cfg_conf.columns = (0..27)
            .map(|n_idx| SpecColumnConf {
                key: EnumColumnKey::Testcase,
                name: format!("c{n_idx}"),
                width: 10.0,
                horizontal: Default::default(),
                vertical: Default::default(),
                merge: false,
            })
            .collect();

        let err = XlsxLayoutWriter::new(cfg_conf).err().unwrap();
        assert!(matches!(
            err,
            XlsxLayoutError::TooManyColumns {
                n_columns: 27,
                n_max: 26
            }
        ));
    }

    #[test]
    fn fresh_sheet_has_header_rows_and_auxiliary_block() {
        let writer = XlsxLayoutWriter::new(SpecConvertConf::default()).unwrap();
        let (grid, _) =
            writer.plan_fresh_sheet(&derive_rows(), "S", &SpecLayoutOptions::default());

        assert_eq!(grid.get_text(0, 0), "NO");
        assert_eq!(grid.get_text(0, 5), "確認事項");
        assert_eq!(grid.get_text(0, 6), "確認者");
        assert_eq!(grid.get_text(0, 9), "備考");
        assert_eq!(grid.cells[&(0, 0)].style, EnumCellStyle::Header);

        assert_eq!(grid.get_text(1, 0), "1-1-1");
        assert_eq!(grid.get_text(1, 4), "1. 入力する\n2. 送信する");
        assert_eq!(grid.get_text(1, 5), "・成功");
        assert_eq!(grid.cells[&(1, 6)].style, EnumCellStyle::Auxiliary);
        assert_eq!(grid.max_row(), Some(6));
    }

    #[test]
    fn merges_follow_contiguous_runs_in_eligible_columns() {
        let writer = XlsxLayoutWriter::new(SpecConvertConf::default()).unwrap();
        let (grid, stats) =
            writer.plan_fresh_sheet(&derive_rows(), "S", &SpecLayoutOptions::default());

        let l_spans: Vec<(usize, usize, usize)> = stats
            .merges
            .iter()
            .map(|merge| (merge.col_start, merge.row_start, merge.row_end))
            .collect();
        // Section column: A A | B B B | C; subsection column: x x | y z w v.
        assert_eq!(l_spans, vec![(1, 1, 2), (1, 3, 5), (2, 1, 2)]);
        assert_eq!(grid.merges.len(), 3);
        assert_eq!(grid.get_text(1, 1), "A");
        assert!(grid.is_blank(2, 1));
        assert_eq!(grid.cells[&(2, 1)].style, EnumCellStyle::Primary(1));
    }

    #[test]
    fn merging_can_be_disabled() {
        let writer = XlsxLayoutWriter::new(SpecConvertConf::default()).unwrap();
        let options = SpecLayoutOptions {
            if_merge_cells: false,
            ..Default::default()
        };
        let (grid, stats) = writer.plan_fresh_sheet(&derive_rows(), "S", &options);
        assert!(stats.merges.is_empty());
        assert_eq!(grid.get_text(2, 1), "A");
    }

    #[test]
    fn widths_never_shrink_below_configured() {
        let writer = XlsxLayoutWriter::new(SpecConvertConf::default()).unwrap();
        let mut l_rows = derive_rows();
        l_rows[0].case_name = "あ".repeat(30);

        let (grid, _) = writer.plan_fresh_sheet(&l_rows, "S", &SpecLayoutOptions::default());
        // Configured 8 beats the estimate for short identifiers.
        assert_eq!(grid.widths[&0], 8.0);
        // 60 units * 10/11 * 1.2 is above the configured 24.
        let n_expected = 60.0 * (10.0 / 11.0) * 1.2;
        assert!((grid.widths[&3] - n_expected).abs() < 1e-9);
        assert_eq!(grid.widths[&6], 12.0);

        let options = SpecLayoutOptions {
            if_auto_width: false,
            ..Default::default()
        };
        let (grid, _) = writer.plan_fresh_sheet(&l_rows, "S", &options);
        assert_eq!(grid.widths[&3], 24.0);
    }

    #[test]
    fn heights_follow_tallest_cell() {
        let writer = XlsxLayoutWriter::new(SpecConvertConf::default()).unwrap();
        let (grid, _) =
            writer.plan_fresh_sheet(&derive_rows(), "S", &SpecLayoutOptions::default());
        // Two step lines at font 10 with 1.5 spacing.
        assert!((grid.heights[&1] - 30.0).abs() < 1e-9);
        assert!(!grid.heights.contains_key(&0));

        let options = SpecLayoutOptions {
            if_auto_height: false,
            ..Default::default()
        };
        let (grid, _) = writer.plan_fresh_sheet(&derive_rows(), "S", &options);
        assert!(grid.heights.is_empty());
    }

    #[test]
    fn custom_estimator_is_used() {
        struct FixedExtent;
        impl TextExtentEstimator for FixedExtent {
            fn estimate_width(&self, _text: &str) -> f64 {
                50.0
            }
            fn estimate_lines(&self, _text: &str) -> usize {
                1
            }
            fn estimate_height(&self, _n_lines: usize) -> f64 {
                20.0
            }
        }

        let writer = XlsxLayoutWriter::new(SpecConvertConf::default())
            .unwrap()
            .with_estimator(FixedExtent);
        let (grid, _) =
            writer.plan_fresh_sheet(&derive_rows(), "S", &SpecLayoutOptions::default());
        assert_eq!(grid.widths[&0], 50.0);
        assert_eq!(grid.heights[&1], 20.0);
    }

    fn derive_report() -> SpecLayoutReport {
        SpecLayoutReport {
            path_file_out: "out.xlsx".into(),
            sheet_name: "S".to_string(),
            mode: EnumLayoutMode::Template,
            row_origin: N_ROW_ORIGIN_FRESH,
            n_rows_written: 0,
            n_rows_restored: 0,
            merges: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn derive_text(c_text: &str) -> EnumCellValue {
        EnumCellValue::String(c_text.to_string())
    }

    #[test]
    fn template_rows_above_origin_keep_their_style() {
        let writer = XlsxLayoutWriter::new(SpecConvertConf::default()).unwrap();
        let mut grid = SheetGrid::new("S");
        grid.set(0, 0, derive_text("機能 試験仕様書"), EnumCellStyle::Raw);
        grid.merges.push(SpecMergeRange {
            row_start: 0,
            row_end: 0,
            col_start: 0,
            col_end: 3,
            value: derive_text("機能 試験仕様書"),
            style: EnumCellStyle::Raw,
        });
        grid.set(1, 0, derive_text("NO"), EnumCellStyle::Raw);
        grid.set(2, 0, derive_text("1-1-1"), EnumCellStyle::Raw);
        grid.set(3, 0, derive_text("9-9-9"), EnumCellStyle::Raw);
        grid.set(3, 12, derive_text("memo"), EnumCellStyle::Raw);

        let mut report = derive_report();
        let patch = writer.plan_template_sheet(
            &mut grid,
            &derive_rows()[..1],
            &SpecLayoutOptions::default(),
            &mut report,
        );

        assert_eq!(report.row_origin, 3);
        assert_eq!(grid.cells[&(0, 0)].style, EnumCellStyle::Raw);
        assert_eq!(grid.cells[&(1, 0)].style, EnumCellStyle::Raw);
        assert_eq!(grid.merges[0].style, EnumCellStyle::Raw);

        assert_eq!((patch.row_start, patch.row_stop, patch.n_cols), (2, 4, 10));
        assert!(patch.cells.keys().all(|&(row, col)| patch.contains_row(row) && col < 10));
        assert_eq!(patch.cells[&(2, 0)].value, derive_text("1-1-1"));
        assert!(!patch.cells.contains_key(&(3, 0)));
        assert_eq!(patch.merges.len(), 1);
        assert_eq!(grid.get_text(3, 12), "memo");
    }

    #[test]
    fn template_without_header_row_gets_one_in_the_patch() {
        let writer = XlsxLayoutWriter::new(SpecConvertConf::default()).unwrap();
        let mut grid = SheetGrid::new("S");
        let mut report = derive_report();
        let patch = writer.plan_template_sheet(
            &mut grid,
            &derive_rows(),
            &SpecLayoutOptions::default(),
            &mut report,
        );

        assert_eq!(report.row_origin, 2);
        assert_eq!((patch.row_start, patch.row_stop), (0, 7));
        assert_eq!(patch.cells[&(0, 0)].style, EnumCellStyle::Header);
        assert_eq!(patch.cells[&(0, 0)].value, derive_text("NO"));
        assert_eq!(patch.cells[&(6, 0)].value, derive_text("3-1-1"));
    }

    #[test]
    fn persist_into_missing_directory_fails_cleanly() {
        let dir_tmp = tempfile::tempdir().unwrap();
        let path_out = dir_tmp.path().join("missing").join("out.xlsx");
        let err = persist_workbook(&path_out, b"bytes").unwrap_err();
        assert!(matches!(err, XlsxLayoutError::WriteFailed { .. }));
        assert!(!path_out.exists());
    }

    #[test]
    fn persist_replaces_destination() {
        let dir_tmp = tempfile::tempdir().unwrap();
        let path_out = dir_tmp.path().join("out.xlsx");
        fs::write(&path_out, b"old").unwrap();
        persist_workbook(&path_out, b"new").unwrap();
        assert_eq!(fs::read(&path_out).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir_tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn locked_destination_maps_to_file_in_use() {
        let path = Path::new("out.xlsx");
        let err = derive_save_error(
            path,
            XlsxError::IoError(std::io::Error::from(std::io::ErrorKind::PermissionDenied)),
        );
        assert!(matches!(err, XlsxLayoutError::FileInUse { .. }));

        let err = derive_save_error(path, XlsxError::RowColumnLimitError);
        assert!(matches!(err, XlsxLayoutError::WriteFailed { .. }));
    }
}
