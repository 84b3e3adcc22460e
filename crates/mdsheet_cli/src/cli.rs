//! CLI argument parsing with clap derive

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use mdsheet_conf::EnumSheetVariant;

/// Convert a Markdown test specification into a styled Excel workbook.
///
/// The workbook is written next to the input as `<stem>.xlsx`. An existing
/// workbook at that path is updated in place unless `--template` is given.
#[derive(Parser, Debug)]
#[command(name = "md2xlsx")]
#[command(version)]
pub struct Cli {
    /// Input Markdown file
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: PathBuf,

    /// Start from the bundled template workbook
    #[arg(long)]
    pub template: bool,

    /// Template workbook to start from (implies --template)
    #[arg(long, value_name = "XLSX")]
    pub template_path: Option<PathBuf>,

    /// Config file (defaults to config.yaml under the package root)
    #[arg(long, value_name = "YAML")]
    pub config: Option<PathBuf>,

    /// Do not merge repeated section/subsection cells
    #[arg(long)]
    pub no_merge: bool,

    /// Keep configured column widths
    #[arg(long)]
    pub no_auto_width: bool,

    /// Keep default row heights
    #[arg(long)]
    pub no_auto_height: bool,

    /// Discard operator-entered columns when updating a workbook
    #[arg(long)]
    pub no_preserve_columns: bool,

    /// Test type selecting the output sheet (test, ut, it)
    #[arg(long, value_name = "TYPE", conflicts_with_all = ["ut", "it"])]
    pub test_type: Option<EnumSheetVariant>,

    /// Shorthand for --test-type ut
    #[arg(long, conflicts_with = "it")]
    pub ut: bool,

    /// Shorthand for --test-type it
    #[arg(long)]
    pub it: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Selected test type; `test` when none is given.
    pub fn sheet_variant(&self) -> EnumSheetVariant {
        if self.ut {
            EnumSheetVariant::Ut
        } else if self.it {
            EnumSheetVariant::It
        } else {
            self.test_type.unwrap_or_default()
        }
    }

    /// Whether a template workbook was requested.
    pub fn if_template(&self) -> bool {
        self.template || self.template_path.is_some()
    }
}
