//! Parsed outline models and read errors.

use std::path::PathBuf;

use mdsheet_conf::EnumColumnKey;
use thiserror::Error;

use crate::conf::{C_PREFIX_EXPECTATION, C_SEP_LINE};

////////////////////////////////////////////////////////////////////////////////
// #region RowModels

/// One leaf test case flattened into a sheet row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecCaseRow {
    /// Hierarchical identifier `"<section>-<subsection>-<case>"`.
    pub identifier: String,
    /// Enclosing section text, if any section line was seen.
    pub section: Option<String>,
    /// Enclosing subsection text; absent for cases directly under a section.
    pub subsection: Option<String>,
    /// Test-case heading text.
    pub case_name: String,
    /// Step lines in document order.
    pub steps: Vec<String>,
    /// Expectation blocks in document order; a block may hold `\n`.
    pub expectations: Vec<String>,
}

impl SpecCaseRow {
    /// Steps as `"1. a\n2. b"`; empty when there are no steps.
    pub fn render_steps(&self) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(n_idx, c_step)| format!("{}. {c_step}", n_idx + 1))
            .collect::<Vec<_>>()
            .join(C_SEP_LINE)
    }

    /// Expectations as `"・a\n・b"`; empty when there are no expectations.
    pub fn render_expectations(&self) -> String {
        self.expectations
            .iter()
            .map(|c_exp| format!("{C_PREFIX_EXPECTATION}{c_exp}"))
            .collect::<Vec<_>>()
            .join(C_SEP_LINE)
    }

    /// Cell text written for a primary column bound to `key`.
    pub fn derive_cell_text(&self, key: EnumColumnKey) -> String {
        match key {
            EnumColumnKey::No => self.identifier.clone(),
            EnumColumnKey::Section => self.section.clone().unwrap_or_default(),
            EnumColumnKey::Subsection => self.subsection.clone().unwrap_or_default(),
            EnumColumnKey::Testcase => self.case_name.clone(),
            EnumColumnKey::Step => self.render_steps(),
            EnumColumnKey::Expectation => self.render_expectations(),
        }
    }
}

/// Steps/expectations collected below one test-case heading.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecCaseBody {
    /// Step lines.
    pub steps: Vec<String>,
    /// Flushed expectation blocks.
    pub expectations: Vec<String>,
    /// Lines consumed before the terminating heading or end of input.
    pub n_lines_consumed: usize,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failures while loading the source text.
#[derive(Error, Debug)]
pub enum MdReadError {
    /// Source text file does not exist.
    #[error("Markdown file not found: {}", .0.display())]
    InputMissing(PathBuf),

    /// Source exists but could not be read as UTF-8 text.
    #[error("Failed to read markdown {}: {source}", path.display())]
    Io {
        /// Source path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
