//! `mdsheet_io_xlsx` v1:
//! Spreadsheet layout engine for parsed test-case rows.
//!
//! - `conf`     : constants and format presets
//! - `spec`     : formats/options/report/errors
//! - `grid`     : in-memory sheet model
//! - `metric`   : text extent estimation
//! - `template` : template sheet loading
//! - `ooxml`    : raw XML splicing and package helpers
//! - `styles`   : stylesheet registration for patched cells
//! - `patch`    : in-place template package rewrite
//! - `util`     : pure helper functions
//! - `writer`   : layout kernel
pub mod conf;
pub mod grid;
pub mod metric;
pub mod ooxml;
pub mod patch;
pub mod spec;
pub mod styles;
pub mod template;
pub mod util;
pub mod writer;

pub use conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL, derive_layout_formats, resolve_cell_format_spec,
};
pub use grid::{SheetGrid, SpecGridCell};
pub use metric::{EastAsianTextExtent, TextExtentEstimator, calculate_text_width_units};
pub use patch::patch_template_package;
pub use spec::{
    EnumCellStyle, EnumCellValue, EnumLayoutMode, SpecCellFormat, SpecLayoutFormats,
    SpecLayoutOptions, SpecLayoutReport, SpecMergeRange, SpecSheetPatch, XlsxLayoutError,
};
pub use template::read_sheet_grid;
pub use util::{is_identifier_text, plan_contiguous_value_runs, sanitize_sheet_name};
pub use writer::{SpecLayoutStats, XlsxLayoutWriter};
