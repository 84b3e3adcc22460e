//! Single-pass orchestration: config, parse, layout, save.

use std::path::Path;

use anyhow::{Context, Result};
use mdsheet_conf::ConfError;
use mdsheet_io_md::{MdReadError, parse_markdown_cases, read_markdown_file};
use mdsheet_io_xlsx::{SpecLayoutOptions, SpecLayoutReport, XlsxLayoutError, XlsxLayoutWriter};
use tracing::{debug, info};

use crate::cli::Cli;
use crate::conf::{N_EXIT_CONF, N_EXIT_FAILURE, N_EXIT_FILE_IN_USE, N_EXIT_INPUT_MISSING};
use crate::resolve::{derive_output_path, resolve_conf, resolve_package_root, resolve_template};

/// Run against the resolved package root.
pub fn run(cli: &Cli) -> Result<SpecLayoutReport> {
    run_with_root(cli, &resolve_package_root())
}

/// Run with an explicit package root.
pub fn run_with_root(cli: &Cli, path_root: &Path) -> Result<SpecLayoutReport> {
    debug!(root = %path_root.display(), "package root");

    let cfg_conf = resolve_conf(cli.config.as_deref(), path_root).context("loading config")?;
    let c_text = read_markdown_file(&cli.file)?;
    let l_rows = parse_markdown_cases(&c_text, &cfg_conf).context("compiling line patterns")?;
    info!(path = %cli.file.display(), n_rows = l_rows.len(), "parsed test cases");

    let path_file_out = derive_output_path(&cli.file);
    let choice = resolve_template(cli, path_root, &path_file_out);
    let if_template = choice.path_template.is_some();
    let options = SpecLayoutOptions {
        if_merge_cells: !cli.no_merge,
        path_template: choice.path_template,
        if_auto_width: !cli.no_auto_width,
        if_auto_height: !cli.no_auto_height,
        if_preserve_auxiliary_columns: if_template && !cli.no_preserve_columns,
        sheet_variant: cli.sheet_variant(),
    };

    let writer = XlsxLayoutWriter::new(cfg_conf)?;
    let mut report = writer.render(&l_rows, &path_file_out, &options)?;
    report.warnings.splice(0..0, choice.warnings);
    Ok(report)
}

/// Process exit code for a failed run.
pub fn derive_exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(err_md) = cause.downcast_ref::<MdReadError>() {
            return match err_md {
                MdReadError::InputMissing(_) => N_EXIT_INPUT_MISSING,
                MdReadError::Io { .. } => N_EXIT_FAILURE,
            };
        }
        if let Some(err_xlsx) = cause.downcast_ref::<XlsxLayoutError>() {
            return match err_xlsx {
                XlsxLayoutError::FileInUse { .. } => N_EXIT_FILE_IN_USE,
                XlsxLayoutError::SheetNotFound { .. } | XlsxLayoutError::TooManyColumns { .. } => {
                    N_EXIT_CONF
                }
                XlsxLayoutError::TemplateRead { .. }
                | XlsxLayoutError::TemplatePackage { .. }
                | XlsxLayoutError::WriteFailed { .. } => N_EXIT_FAILURE,
            };
        }
        if cause.downcast_ref::<ConfError>().is_some() {
            return N_EXIT_CONF;
        }
    }
    N_EXIT_FAILURE
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let err = anyhow::Error::new(MdReadError::InputMissing(PathBuf::from("a.md")));
        assert_eq!(derive_exit_code(&err), 2);

        let err = anyhow::Error::new(XlsxLayoutError::FileInUse {
            path: PathBuf::from("a.xlsx"),
        })
        .context("saving");
        assert_eq!(derive_exit_code(&err), 3);

        let err = anyhow::Error::new(ConfError::Invalid("x".to_string())).context("loading config");
        assert_eq!(derive_exit_code(&err), 4);

        let err = anyhow::Error::new(XlsxLayoutError::SheetNotFound {
            path: PathBuf::from("t.xlsx"),
            sheet_name: "S".to_string(),
        });
        assert_eq!(derive_exit_code(&err), 4);

        assert_eq!(derive_exit_code(&anyhow::anyhow!("boom")), 1);
    }
}
