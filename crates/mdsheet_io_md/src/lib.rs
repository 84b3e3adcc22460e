//! `mdsheet_io_md` v1:
//! Outline parser turning a Markdown test specification into numbered rows.
//!
//! - `conf`   : rendering constants
//! - `spec`   : row models and read errors
//! - `parser` : stateful outline parser
//! - `util`   : source text loading
pub mod conf;
pub mod parser;
pub mod spec;
pub mod util;

pub use parser::{MarkdownCaseParser, parse_markdown_cases};
pub use spec::{MdReadError, SpecCaseBody, SpecCaseRow};
pub use util::read_markdown_file;
