//! Shared layout models, options, report, and errors.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use mdsheet_conf::EnumSheetVariant;
use thiserror::Error;

use crate::grid::SpecGridCell;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification; `None` fields inherit on [`Self::merge`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<f64>,
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Format presets resolved once per writer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecLayoutFormats {
    /// Header row cells.
    pub header: SpecCellFormat,
    /// Data cells, one entry per primary column.
    pub primary: Vec<SpecCellFormat>,
    /// Auxiliary data cells.
    pub auxiliary: SpecCellFormat,
    /// Patch applied on top of any slot for date values.
    pub datetime: SpecCellFormat,
}

/// Normalized cell value held by the in-memory sheet grid.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Spreadsheet date/time serial.
    DateTime(f64),
}

impl EnumCellValue {
    /// Text used for identity keys and extent estimation.
    pub fn to_text(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::String(s) => s.clone(),
            Self::Number(n) | Self::DateTime(n) => n.to_string(),
        }
    }

    /// Blank cell or empty text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::None => true,
            Self::String(s) => s.trim().is_empty(),
            Self::Number(_) | Self::DateTime(_) => false,
        }
    }
}

/// Style slot assigned to a grid cell, resolved to a concrete format on emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCellStyle {
    /// Replayed template cell without layout styling.
    Raw,
    /// Header cell.
    Header,
    /// Data cell of the primary column at this zero-based index.
    Primary(usize),
    /// Auxiliary operator-input cell.
    Auxiliary,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LayoutOptions

/// Per-render options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLayoutOptions {
    /// Merge contiguous runs in merge-eligible columns.
    pub if_merge_cells: bool,
    /// Workbook to start from; equal to the destination for in-place updates.
    pub path_template: Option<PathBuf>,
    /// Widen columns from estimated text width.
    pub if_auto_width: bool,
    /// Grow rows from estimated wrapped line count.
    pub if_auto_height: bool,
    /// Carry auxiliary values over by row identifier (template mode only).
    pub if_preserve_auxiliary_columns: bool,
    /// Test type selecting the sheet name.
    pub sheet_variant: EnumSheetVariant,
}

impl Default for SpecLayoutOptions {
    fn default() -> Self {
        Self {
            if_merge_cells: true,
            path_template: None,
            if_auto_width: true,
            if_auto_height: true,
            if_preserve_auxiliary_columns: false,
            sheet_variant: EnumSheetVariant::Test,
        }
    }
}

/// Rectangular merged range, zero-based and inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecMergeRange {
    /// First row.
    pub row_start: usize,
    /// Last row.
    pub row_end: usize,
    /// First column.
    pub col_start: usize,
    /// Last column.
    pub col_end: usize,
    /// Anchor value shown by the merged cell.
    pub value: EnumCellValue,
    /// Style of the merged cell.
    pub style: EnumCellStyle,
}

impl SpecMergeRange {
    /// Whether the range shares at least one cell with the given block.
    pub fn intersects(
        &self,
        row_start: usize,
        row_end: usize,
        col_start: usize,
        col_end: usize,
    ) -> bool {
        self.row_start <= row_end
            && row_start <= self.row_end
            && self.col_start <= col_end
            && col_start <= self.col_end
    }
}

/// Layout path taken by one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumLayoutMode {
    /// New workbook with a single generated sheet.
    Fresh,
    /// Template workbook patched in place and saved to the destination.
    Template,
}

impl fmt::Display for EnumLayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => f.write_str("fresh"),
            Self::Template => f.write_str("template"),
        }
    }
}

/// Rewrite of one template sheet, applied to the workbook package in place.
///
/// Rows in `row_start..row_stop` lose their cells in columns `0..n_cols` and
/// receive `cells` instead; everything else in the sheet part is kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheetPatch {
    /// Target sheet name.
    pub sheet_name: String,
    /// First rewritten row, zero-based.
    pub row_start: usize,
    /// Row after the last rewritten row.
    pub row_stop: usize,
    /// Rewritten column count, starting at column `A`.
    pub n_cols: usize,
    /// Replacement cells inside the rewritten block.
    pub cells: BTreeMap<(usize, usize), SpecGridCell>,
    /// Column widths to set.
    pub widths: BTreeMap<usize, f64>,
    /// Row heights to set.
    pub heights: BTreeMap<usize, f64>,
    /// Complete merged-range set of the sheet after the update.
    pub merges: Vec<SpecMergeRange>,
}

impl SpecSheetPatch {
    /// Whether `row` lies in the rewritten block.
    pub fn contains_row(&self, row: usize) -> bool {
        (self.row_start..self.row_stop).contains(&row)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per-render report.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecLayoutReport {
    /// Saved workbook path.
    pub path_file_out: PathBuf,
    /// Target sheet name.
    pub sheet_name: String,
    /// Layout path taken.
    pub mode: EnumLayoutMode,
    /// One-based spreadsheet row of the first written data row.
    pub row_origin: usize,
    /// Parsed rows written.
    pub n_rows_written: usize,
    /// Auxiliary rows restored from the previous data block.
    pub n_rows_restored: usize,
    /// Merged ranges created over data rows.
    pub merges: Vec<SpecMergeRange>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecLayoutReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} mode={} sheet={} origin={} rows={} restored={} merges={} warnings={}",
            self.mode,
            self.sheet_name,
            self.row_origin,
            self.n_rows_written,
            self.n_rows_restored,
            self.merges.len(),
            self.warnings.len()
        )
    }
}

impl fmt::Display for SpecLayoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[XLSX]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Layout failures; every variant aborts the render.
#[derive(Error, Debug)]
pub enum XlsxLayoutError {
    /// More primary columns than the `A`..=`Z` range.
    #[error("Too many columns: {n_columns} configured, at most {n_max} are supported.")]
    TooManyColumns {
        /// Configured primary column count.
        n_columns: usize,
        /// Supported maximum.
        n_max: usize,
    },

    /// Template workbook lacks the target sheet.
    #[error("Sheet {sheet_name:?} not found in template {}.", path.display())]
    SheetNotFound {
        /// Template workbook path.
        path: PathBuf,
        /// Expected sheet name.
        sheet_name: String,
    },

    /// Destination is locked by another process.
    #[error("Output file {} may be open in another program; close it and run again.", path.display())]
    FileInUse {
        /// Destination path.
        path: PathBuf,
    },

    /// Template workbook could not be parsed.
    #[error("Failed to read template workbook {}: {source}", path.display())]
    TemplateRead {
        /// Workbook path.
        path: PathBuf,
        /// Underlying reader error.
        #[source]
        source: calamine::XlsxError,
    },

    /// Template package parts could not be located or rewritten.
    #[error("Template {} could not be patched: {message}", path.display())]
    TemplatePackage {
        /// Template workbook path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Any other failure while assembling or saving the workbook.
    #[error("Failed to write workbook {}: {source}", path.display())]
    WriteFailed {
        /// Destination path.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
