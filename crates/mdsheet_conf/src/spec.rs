//! Conversion configuration models and configuration errors.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conf::{
    C_FONT_NAME_DEFAULT, C_PATTERN_EXPECTATION_DEFAULT, C_PATTERN_SECTION_DEFAULT,
    C_PATTERN_STEP_DEFAULT, C_PATTERN_SUBSECTION_DEFAULT, C_PATTERN_TESTCASE_DEFAULT,
    C_SHEET_NAME_IT_DEFAULT, C_SHEET_NAME_TEST_DEFAULT, C_SHEET_NAME_UT_DEFAULT,
    N_FONT_SIZE_DEFAULT, N_WIDTH_COLUMN_DEFAULT, derive_default_auxiliary_names,
    derive_default_columns,
};

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Logical row field bound to one primary column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumColumnKey {
    /// Hierarchical identifier (`1-2-3`); the row-identity key column.
    No,
    /// Section heading text.
    Section,
    /// Subsection heading text.
    Subsection,
    /// Test-case heading text.
    Testcase,
    /// Numbered step list.
    Step,
    /// Bulleted expectation list.
    Expectation,
}

/// Output sheet variant, one per test type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumSheetVariant {
    /// Generic test specification.
    #[default]
    Test,
    /// Unit test.
    Ut,
    /// Integration test.
    It,
}

impl EnumSheetVariant {
    /// Short lowercase name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Ut => "ut",
            Self::It => "it",
        }
    }
}

impl fmt::Display for EnumSheetVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnumSheetVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(Self::Test),
            "ut" => Ok(Self::Ut),
            "it" => Ok(Self::It),
            other => Err(format!(
                "Unknown test type {other:?}; expected one of: test, ut, it."
            )),
        }
    }
}

/// Horizontal cell alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumHorizontalAlign {
    /// Spreadsheet default.
    General,
    /// Left aligned.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Right aligned.
    Right,
    /// Justified.
    Justify,
    /// Distributed.
    Distributed,
}

/// Vertical cell alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumVerticalAlign {
    /// Top aligned.
    #[default]
    Top,
    /// Vertically centered.
    Center,
    /// Bottom aligned.
    Bottom,
    /// Justified.
    Justify,
    /// Distributed.
    Distributed,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConfModels

/// Sheet names per test type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecSheetNameConf {
    /// Sheet for the generic test specification.
    pub test: String,
    /// Sheet for unit tests.
    pub ut: String,
    /// Sheet for integration tests.
    pub it: String,
}

impl Default for SpecSheetNameConf {
    fn default() -> Self {
        Self {
            test: C_SHEET_NAME_TEST_DEFAULT.to_string(),
            ut: C_SHEET_NAME_UT_DEFAULT.to_string(),
            it: C_SHEET_NAME_IT_DEFAULT.to_string(),
        }
    }
}

/// Workbook-wide font and sheet settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecExcelSettingsConf {
    /// Font family applied to every written cell.
    pub font_name: String,
    /// Font size in points.
    pub font_size: f64,
    /// Sheet names per test type.
    pub sheet_name: SpecSheetNameConf,
}

impl Default for SpecExcelSettingsConf {
    fn default() -> Self {
        Self {
            font_name: C_FONT_NAME_DEFAULT.to_string(),
            font_size: N_FONT_SIZE_DEFAULT,
            sheet_name: SpecSheetNameConf::default(),
        }
    }
}

/// Line patterns recognized by the outline parser.
///
/// Each pattern carries exactly one capture group and is matched at line start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecMarkdownPatterns {
    /// Section heading.
    pub section: String,
    /// Subsection heading.
    pub subsection: String,
    /// Test-case heading.
    pub testcase: String,
    /// Numbered step line.
    pub step: String,
    /// Checklist expectation line.
    pub expectation: String,
}

impl Default for SpecMarkdownPatterns {
    fn default() -> Self {
        Self {
            section: C_PATTERN_SECTION_DEFAULT.to_string(),
            subsection: C_PATTERN_SUBSECTION_DEFAULT.to_string(),
            testcase: C_PATTERN_TESTCASE_DEFAULT.to_string(),
            step: C_PATTERN_STEP_DEFAULT.to_string(),
            expectation: C_PATTERN_EXPECTATION_DEFAULT.to_string(),
        }
    }
}

impl SpecMarkdownPatterns {
    /// `(field name, pattern)` pairs in declaration order.
    pub fn iter_named(&self) -> [(&'static str, &str); 5] {
        [
            ("section", self.section.as_str()),
            ("subsection", self.subsection.as_str()),
            ("testcase", self.testcase.as_str()),
            ("step", self.step.as_str()),
            ("expectation", self.expectation.as_str()),
        ]
    }
}

fn default_column_width() -> f64 {
    N_WIDTH_COLUMN_DEFAULT
}

/// One primary column; list position decides the spreadsheet letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecColumnConf {
    /// Row field written into this column.
    pub key: EnumColumnKey,
    /// Header text.
    pub name: String,
    /// Configured width in character units.
    #[serde(default = "default_column_width")]
    pub width: f64,
    /// Horizontal alignment of data cells.
    #[serde(default)]
    pub horizontal: EnumHorizontalAlign,
    /// Vertical alignment of data cells.
    #[serde(default)]
    pub vertical: EnumVerticalAlign,
    /// Merge contiguous runs of equal values.
    #[serde(default)]
    pub merge: bool,
}

/// Operator-entered columns placed right of the primary columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecAuxiliaryColumnsConf {
    /// Default width shared by all auxiliary columns.
    pub width: f64,
    /// Header texts, left to right.
    pub names: Vec<String>,
}

impl Default for SpecAuxiliaryColumnsConf {
    fn default() -> Self {
        Self {
            width: 12.0,
            names: derive_default_auxiliary_names(),
        }
    }
}

/// Tuning for width/height estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecAutofitConf {
    /// Lower clamp of an estimated column width.
    pub width_min: f64,
    /// Upper clamp of an estimated column width.
    pub width_max: f64,
    /// Legibility multiplier applied to the raw width units.
    pub width_multiplier: f64,
    /// Font size the width units are calibrated for.
    pub font_size_base: f64,
    /// Assumed characters per wrapped line.
    pub chars_per_line: usize,
    /// Line height as a multiple of the font size.
    pub line_spacing: f64,
    /// Minimum row height in points.
    pub height_min: f64,
}

impl Default for SpecAutofitConf {
    fn default() -> Self {
        Self {
            width_min: 8.0,
            width_max: 80.0,
            width_multiplier: 1.2,
            font_size_base: 11.0,
            chars_per_line: 40,
            line_spacing: 1.5,
            height_min: 15.0,
        }
    }
}

/// Root configuration handed to the parser and the layout engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecConvertConf {
    /// Font and sheet settings.
    pub excel_settings: SpecExcelSettingsConf,
    /// Outline line patterns.
    pub markdown: SpecMarkdownPatterns,
    /// Primary columns in spreadsheet order.
    pub columns: Vec<SpecColumnConf>,
    /// Auxiliary operator columns.
    pub auxiliary_columns: SpecAuxiliaryColumnsConf,
    /// Auto width/height tuning.
    pub autofit: SpecAutofitConf,
}

impl Default for SpecConvertConf {
    fn default() -> Self {
        Self {
            excel_settings: SpecExcelSettingsConf::default(),
            markdown: SpecMarkdownPatterns::default(),
            columns: derive_default_columns(),
            auxiliary_columns: SpecAuxiliaryColumnsConf::default(),
            autofit: SpecAutofitConf::default(),
        }
    }
}

impl SpecConvertConf {
    /// Resolve the target sheet name for a test type.
    pub fn sheet_name(&self, variant: EnumSheetVariant) -> &str {
        match variant {
            EnumSheetVariant::Test => &self.excel_settings.sheet_name.test,
            EnumSheetVariant::Ut => &self.excel_settings.sheet_name.ut,
            EnumSheetVariant::It => &self.excel_settings.sheet_name.it,
        }
    }

    /// Zero-based index of the first column bound to the identifier.
    pub fn key_column_index(&self) -> Option<usize> {
        self.columns
            .iter()
            .position(|col| col.key == EnumColumnKey::No)
    }

    /// Header texts of the primary columns.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }

    /// Check schema constraints; see [`crate::util::validate_conf`].
    pub fn validate(&self) -> Result<(), ConfError> {
        crate::util::validate_conf(self)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfError {
    /// Config file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid YAML for the schema.
    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A line pattern does not compile or has the wrong capture-group count.
    #[error("Invalid `{field}` pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Pattern field name.
        field: &'static str,
        /// Offending pattern text.
        pattern: String,
        /// Compiler or validation message.
        message: String,
    },

    /// Any other schema violation.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
