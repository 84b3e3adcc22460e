//! Config loading, validation, and pattern compilation helpers.

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::conf::N_NCOLS_PRIMARY_MAX;
use crate::spec::{ConfError, SpecConvertConf};

/// Read, parse, and validate a YAML config file.
pub fn load_conf(path: impl AsRef<Path>) -> Result<SpecConvertConf, ConfError> {
    let path_conf = path.as_ref();
    let c_text = fs::read_to_string(path_conf).map_err(|source| ConfError::Read {
        path: path_conf.to_path_buf(),
        source,
    })?;
    let cfg_conf = load_conf_from_str(&c_text)?;
    debug!(path = %path_conf.display(), n_columns = cfg_conf.columns.len(), "loaded config");
    Ok(cfg_conf)
}

/// Parse and validate a YAML config document.
pub fn load_conf_from_str(text: &str) -> Result<SpecConvertConf, ConfError> {
    let cfg_conf: SpecConvertConf = serde_yaml::from_str(text)?;
    validate_conf(&cfg_conf)?;
    Ok(cfg_conf)
}

/// Compile one outline pattern anchored at line start.
///
/// The pattern must carry exactly one capture group.
pub fn compile_line_pattern(field: &'static str, pattern: &str) -> Result<Regex, ConfError> {
    let re = Regex::new(&format!("^(?:{pattern})")).map_err(|err| ConfError::InvalidPattern {
        field,
        pattern: pattern.to_string(),
        message: err.to_string(),
    })?;

    // `captures_len` counts the implicit whole-match group.
    let n_groups = re.captures_len() - 1;
    if n_groups != 1 {
        return Err(ConfError::InvalidPattern {
            field,
            pattern: pattern.to_string(),
            message: format!("expected exactly 1 capture group, found {n_groups}"),
        });
    }
    Ok(re)
}

/// Check schema-level invariants that serde cannot express.
///
/// The primary-column limit is enforced by the layout engine at writer
/// construction, so a config with too many columns still loads here.
pub fn validate_conf(conf: &SpecConvertConf) -> Result<(), ConfError> {
    if conf.columns.is_empty() {
        return Err(ConfError::Invalid(
            "`columns` must declare at least one column.".to_string(),
        ));
    }
    for (field, pattern) in conf.markdown.iter_named() {
        compile_line_pattern(field, pattern)?;
    }

    let excel = &conf.excel_settings;
    if !(excel.font_size > 0.0) {
        return Err(ConfError::Invalid(format!(
            "`excel_settings.font_size` must be > 0, got {}.",
            excel.font_size
        )));
    }
    for (c_variant, c_name) in [
        ("test", &excel.sheet_name.test),
        ("ut", &excel.sheet_name.ut),
        ("it", &excel.sheet_name.it),
    ] {
        if c_name.trim().is_empty() {
            return Err(ConfError::Invalid(format!(
                "`excel_settings.sheet_name.{c_variant}` must not be empty."
            )));
        }
    }

    for col in &conf.columns {
        if !(col.width > 0.0) {
            return Err(ConfError::Invalid(format!(
                "Column {:?} width must be > 0, got {}.",
                col.name, col.width
            )));
        }
    }
    if !(conf.auxiliary_columns.width > 0.0) {
        return Err(ConfError::Invalid(
            "`auxiliary_columns.width` must be > 0.".to_string(),
        ));
    }

    let autofit = &conf.autofit;
    if !(autofit.width_min > 0.0) {
        return Err(ConfError::Invalid(
            "`autofit.width_min` must be > 0.".to_string(),
        ));
    }
    if autofit.width_max < autofit.width_min {
        return Err(ConfError::Invalid(
            "`autofit.width_max` must be >= `autofit.width_min`.".to_string(),
        ));
    }
    if autofit.chars_per_line == 0 {
        return Err(ConfError::Invalid(
            "`autofit.chars_per_line` must be >= 1.".to_string(),
        ));
    }
    if !(autofit.font_size_base > 0.0) || !(autofit.line_spacing > 0.0) {
        return Err(ConfError::Invalid(
            "`autofit.font_size_base` and `autofit.line_spacing` must be > 0.".to_string(),
        ));
    }

    Ok(())
}

/// Whether `n_columns` primary columns fit the supported letter range.
pub fn is_primary_column_count_supported(n_columns: usize) -> bool {
    n_columns <= N_NCOLS_PRIMARY_MAX
}
