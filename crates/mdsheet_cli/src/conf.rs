//! CLI constants.

/// Template workbook path relative to the package root.
pub const C_PATH_TEMPLATE_REL: [&str; 2] = ["assets", "template.xlsx"];
/// Output workbook extension.
pub const C_EXT_OUTPUT: &str = "xlsx";

/// Unclassified failure.
pub const N_EXIT_FAILURE: u8 = 1;
/// Input Markdown file missing.
pub const N_EXIT_INPUT_MISSING: u8 = 2;
/// Output workbook locked by another program.
pub const N_EXIT_FILE_IN_USE: u8 = 3;
/// Config does not fit the input or the template.
pub const N_EXIT_CONF: u8 = 4;
