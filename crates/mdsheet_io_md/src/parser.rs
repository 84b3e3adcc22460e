//! Stateful outline parser: section → subsection → test case → steps/expectations.

use std::collections::HashMap;

use mdsheet_conf::{ConfError, SpecConvertConf, SpecMarkdownPatterns, compile_line_pattern};
use regex::Regex;
use tracing::debug;

use crate::conf::{C_MARKER_HEADING, C_SEP_LINE};
use crate::spec::{SpecCaseBody, SpecCaseRow};

/// Scope key for subsection numbering: `(section, subsection)`.
type SubsectionScope = (Option<String>, String);

/// Outline parser holding compiled patterns and per-parse counters.
///
/// Counters are reset at the start of every [`Self::parse`] call, so one
/// instance can parse several documents independently.
#[derive(Debug)]
pub struct MarkdownCaseParser {
    re_section: Regex,
    re_subsection: Regex,
    re_testcase: Regex,
    re_step: Regex,
    re_expectation: Regex,

    current_section: Option<String>,
    current_subsection: Option<String>,
    last_subsection_scope: Option<SubsectionScope>,

    n_section_count: usize,
    dict_section_nums: HashMap<String, usize>,
    n_subsection_count: usize,
    dict_subsection_nums: HashMap<SubsectionScope, usize>,
    n_testcase_count: usize,
}

impl MarkdownCaseParser {
    /// Compile line patterns; fails on invalid pattern config.
    pub fn new(patterns: &SpecMarkdownPatterns) -> Result<Self, ConfError> {
        Ok(Self {
            re_section: compile_line_pattern("section", &patterns.section)?,
            re_subsection: compile_line_pattern("subsection", &patterns.subsection)?,
            re_testcase: compile_line_pattern("testcase", &patterns.testcase)?,
            re_step: compile_line_pattern("step", &patterns.step)?,
            re_expectation: compile_line_pattern("expectation", &patterns.expectation)?,
            current_section: None,
            current_subsection: None,
            last_subsection_scope: None,
            n_section_count: 0,
            dict_section_nums: HashMap::new(),
            n_subsection_count: 0,
            dict_subsection_nums: HashMap::new(),
            n_testcase_count: 0,
        })
    }

    /// Parse `text` into one row per test-case heading, in document order.
    ///
    /// Never fails on structure: cases without an enclosing section or
    /// subsection get `0` in the corresponding identifier slot.
    pub fn parse(&mut self, text: &str) -> Vec<SpecCaseRow> {
        self.reset();

        let l_lines: Vec<&str> = text.lines().collect();
        let mut l_rows = Vec::new();
        let mut n_idx = 0usize;

        while n_idx < l_lines.len() {
            let line = l_lines[n_idx];
            n_idx += 1;

            if let Some(c_text) = capture_text(&self.re_section, line) {
                self.enter_section(c_text);
            } else if let Some(c_text) = capture_text(&self.re_subsection, line) {
                self.enter_subsection(c_text);
            } else if let Some(c_case_name) = capture_text(&self.re_testcase, line) {
                self.n_testcase_count += 1;

                let body = self.scan_case_body(&l_lines[n_idx..]);
                n_idx += body.n_lines_consumed;

                let row = SpecCaseRow {
                    identifier: self.derive_identifier(),
                    section: self.current_section.clone(),
                    subsection: self.current_subsection.clone(),
                    case_name: c_case_name,
                    steps: body.steps,
                    expectations: body.expectations,
                };
                debug!(
                    identifier = %row.identifier,
                    case_name = %row.case_name,
                    n_steps = row.steps.len(),
                    n_expectations = row.expectations.len(),
                    "parsed test case"
                );
                l_rows.push(row);
            }
        }

        l_rows
    }

    /// Collect steps/expectations below a test-case heading.
    ///
    /// `lines` starts right after the heading. The scan stops before the next
    /// heading line or at end of input; a blank line closes an open
    /// expectation block, a new expectation or step line flushes it, and any
    /// other non-blank line continues it.
    pub fn scan_case_body(&self, lines: &[&str]) -> SpecCaseBody {
        let mut body = SpecCaseBody::default();
        let mut c_expectation_open: Option<String> = None;

        for line in lines {
            if let Some(c_step) = capture_text(&self.re_step, line) {
                flush_expectation(&mut c_expectation_open, &mut body.expectations);
                body.steps.push(c_step);
            } else if let Some(c_exp) = capture_text(&self.re_expectation, line) {
                flush_expectation(&mut c_expectation_open, &mut body.expectations);
                c_expectation_open = Some(c_exp);
            } else if self.is_heading_line(line) {
                break;
            } else if line.trim().is_empty() {
                flush_expectation(&mut c_expectation_open, &mut body.expectations);
            } else if let Some(c_exp) = c_expectation_open.as_mut() {
                c_exp.push_str(C_SEP_LINE);
                c_exp.push_str(line.trim());
            }
            body.n_lines_consumed += 1;
        }

        flush_expectation(&mut c_expectation_open, &mut body.expectations);
        body
    }

    /// Heading marker prefix or any configured heading pattern.
    pub fn is_heading_line(&self, line: &str) -> bool {
        line.starts_with(C_MARKER_HEADING)
            || self.re_section.is_match(line)
            || self.re_subsection.is_match(line)
            || self.re_testcase.is_match(line)
    }

    fn reset(&mut self) {
        self.current_section = None;
        self.current_subsection = None;
        self.last_subsection_scope = None;
        self.n_section_count = 0;
        self.dict_section_nums.clear();
        self.n_subsection_count = 0;
        self.dict_subsection_nums.clear();
        self.n_testcase_count = 0;
    }

    fn enter_section(&mut self, c_section: String) {
        let if_section_changed = self.current_section.as_deref() != Some(c_section.as_str());
        let if_scope_changed = if_section_changed || self.current_subsection.is_some();

        if !self.dict_section_nums.contains_key(&c_section) {
            self.n_section_count += 1;
            self.dict_section_nums
                .insert(c_section.clone(), self.n_section_count);
        }
        // Re-entering a known section still starts a fresh subsection scope.
        if if_section_changed {
            self.n_subsection_count = 0;
            self.dict_subsection_nums.clear();
            self.last_subsection_scope = None;
        }
        if if_scope_changed {
            self.n_testcase_count = 0;
        }

        self.current_section = Some(c_section);
        self.current_subsection = None;
    }

    fn enter_subsection(&mut self, c_subsection: String) {
        let scope: SubsectionScope = (self.current_section.clone(), c_subsection.clone());

        if !self.dict_subsection_nums.contains_key(&scope) {
            self.n_subsection_count += 1;
            self.dict_subsection_nums
                .insert(scope.clone(), self.n_subsection_count);
        }
        if self.last_subsection_scope.as_ref() != Some(&scope) {
            self.n_testcase_count = 0;
            self.last_subsection_scope = Some(scope);
        }

        self.current_subsection = Some(c_subsection);
    }

    fn derive_identifier(&self) -> String {
        let n_section = self
            .current_section
            .as_ref()
            .and_then(|c_section| self.dict_section_nums.get(c_section))
            .copied()
            .unwrap_or(0);
        let n_subsection = self
            .current_subsection
            .as_ref()
            .and_then(|c_subsection| {
                self.dict_subsection_nums
                    .get(&(self.current_section.clone(), c_subsection.clone()))
            })
            .copied()
            .unwrap_or(0);
        format!("{n_section}-{n_subsection}-{}", self.n_testcase_count)
    }
}

/// Parse `text` with the patterns declared in `conf`.
pub fn parse_markdown_cases(
    text: &str,
    conf: &SpecConvertConf,
) -> Result<Vec<SpecCaseRow>, ConfError> {
    let mut parser = MarkdownCaseParser::new(&conf.markdown)?;
    Ok(parser.parse(text))
}

fn capture_text(re: &Regex, line: &str) -> Option<String> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end().to_string())
}

fn flush_expectation(c_open: &mut Option<String>, l_expectations: &mut Vec<String>) {
    if let Some(c_exp) = c_open.take()
        && !c_exp.is_empty()
    {
        l_expectations.push(c_exp);
    }
}
