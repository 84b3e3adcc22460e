//! md2xlsx - Markdown test specification to Excel workbook

use std::process::ExitCode;

use clap::Parser;
use mdsheet_cli::{Cli, derive_exit_code, init_tracing, run};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(report) => {
            for c_warning in &report.warnings {
                eprintln!("warning: {c_warning}");
            }
            println!(
                "Done! The file is saved at `{}` (sheet: {}).",
                report.path_file_out.display(),
                report.sheet_name
            );
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(derive_exit_code(&err))
        }
    }
}
