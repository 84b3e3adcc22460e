use std::path::{Path, PathBuf};

use calamine::{Reader, Xlsx, open_workbook};
use clap::Parser;
use mdsheet_cli::{Cli, derive_exit_code, run_with_root};
use mdsheet_io_xlsx::EnumLayoutMode;

const C_MARKDOWN: &str = "\
# ログイン
## 正常系
### ID/PWが正しい
1. 入力する
2. 送信する
- [ ] ホーム画面が表示される
### 空欄
1. 送信する
- [ ] エラーが表示される
";

fn write_input(dir: &Path) -> PathBuf {
    let path_md = dir.join("login.md");
    std::fs::write(&path_md, C_MARKDOWN).expect("write input");
    path_md
}

fn parse_cli(path_md: &Path, l_extra: &[&str]) -> Cli {
    let c_path_md = path_md.to_string_lossy().to_string();
    let mut l_argv = vec!["md2xlsx", "-f", c_path_md.as_str()];
    l_argv.extend_from_slice(l_extra);
    Cli::try_parse_from(l_argv).expect("parse args")
}

fn read_cell(path: &Path, sheet_name: &str, row: u32, col: u32) -> String {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("open workbook");
    let range = workbook.worksheet_range(sheet_name).expect("sheet");
    range
        .get_value((row, col))
        .map(|data| data.to_string())
        .unwrap_or_default()
}

#[test]
fn converts_next_to_input_with_default_config() {
    let dir_tmp = tempfile::tempdir().expect("tempdir");
    let path_md = write_input(dir_tmp.path());

    let report = run_with_root(&parse_cli(&path_md, &[]), dir_tmp.path()).expect("run");

    let path_out = dir_tmp.path().join("login.xlsx");
    assert_eq!(report.path_file_out, path_out);
    assert_eq!(report.mode, EnumLayoutMode::Fresh);
    assert_eq!(report.n_rows_written, 2);
    assert_eq!(read_cell(&path_out, "テスト仕様書", 1, 0), "1-1-1");
    assert_eq!(read_cell(&path_out, "テスト仕様書", 2, 3), "空欄");
}

#[test]
fn second_run_updates_existing_output_in_place() {
    let dir_tmp = tempfile::tempdir().expect("tempdir");
    let path_md = write_input(dir_tmp.path());
    let cli = parse_cli(&path_md, &[]);

    run_with_root(&cli, dir_tmp.path()).expect("first run");
    let report = run_with_root(&cli, dir_tmp.path()).expect("second run");

    assert_eq!(report.mode, EnumLayoutMode::Template);
    assert_eq!(report.row_origin, 2);
    let path_out = dir_tmp.path().join("login.xlsx");
    assert_eq!(read_cell(&path_out, "テスト仕様書", 0, 0), "NO");
    assert_eq!(read_cell(&path_out, "テスト仕様書", 2, 0), "1-1-2");
    assert_eq!(read_cell(&path_out, "テスト仕様書", 3, 0), "");
}

#[test]
fn missing_bundled_template_warns_and_creates_fresh() {
    let dir_tmp = tempfile::tempdir().expect("tempdir");
    let path_md = write_input(dir_tmp.path());

    let report =
        run_with_root(&parse_cli(&path_md, &["--template", "--it"]), dir_tmp.path()).expect("run");

    assert_eq!(report.mode, EnumLayoutMode::Fresh);
    assert_eq!(report.sheet_name, "結合試験");
    assert!(report.warnings[0].contains("template.xlsx"));
}

#[test]
fn config_under_package_root_is_used() {
    let dir_tmp = tempfile::tempdir().expect("tempdir");
    let path_md = write_input(dir_tmp.path());
    std::fs::write(
        dir_tmp.path().join("config.yaml"),
        "excel_settings:\n  sheet_name: { test: Cases, ut: UT, it: IT }\n",
    )
    .expect("write config");

    let report = run_with_root(&parse_cli(&path_md, &[]), dir_tmp.path()).expect("run");
    assert_eq!(report.sheet_name, "Cases");
}

#[test]
fn missing_input_exits_with_input_code() {
    let dir_tmp = tempfile::tempdir().expect("tempdir");
    let path_md = dir_tmp.path().join("absent.md");

    let err = run_with_root(&parse_cli(&path_md, &[]), dir_tmp.path()).expect_err("missing input");
    assert_eq!(derive_exit_code(&err), 2);
}

#[test]
fn invalid_config_exits_with_config_code() {
    let dir_tmp = tempfile::tempdir().expect("tempdir");
    let path_md = write_input(dir_tmp.path());
    let path_conf = dir_tmp.path().join("bad.yaml");
    std::fs::write(&path_conf, "markdown:\n  step: \"\\\\d+\\\\. .+\"\n").expect("write config");
    let c_path_conf = path_conf.to_string_lossy().to_string();

    let err = run_with_root(
        &parse_cli(&path_md, &["--config", c_path_conf.as_str()]),
        dir_tmp.path(),
    )
    .expect_err("invalid config");
    assert_eq!(derive_exit_code(&err), 4);
    assert!(!dir_tmp.path().join("login.xlsx").exists());
}
