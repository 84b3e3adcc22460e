//! `mdsheet_conf` v1:
//! Declarative schema shared by the outline parser and the sheet layout engine.
//!
//! - `conf` : constants and default presets
//! - `spec` : config models and errors
//! - `util` : loading, validation, and pattern compilation
pub mod conf;
pub mod spec;
pub mod util;

pub use conf::{C_ENV_PACKAGE_ROOT, C_FILE_NAME_CONF, N_NCOLS_PRIMARY_MAX};
pub use spec::{
    ConfError, EnumColumnKey, EnumHorizontalAlign, EnumSheetVariant, EnumVerticalAlign,
    SpecAutofitConf, SpecAuxiliaryColumnsConf, SpecColumnConf, SpecConvertConf,
    SpecExcelSettingsConf, SpecMarkdownPatterns, SpecSheetNameConf,
};
pub use util::{
    compile_line_pattern, is_primary_column_count_supported, load_conf, load_conf_from_str,
    validate_conf,
};
