//! Configuration constants and default preset factories.

use crate::spec::{EnumColumnKey, EnumHorizontalAlign, EnumVerticalAlign, SpecColumnConf};

/// Config file name looked up under the package root.
pub const C_FILE_NAME_CONF: &str = "config.yaml";
/// Environment variable overriding the package root.
pub const C_ENV_PACKAGE_ROOT: &str = "MDSHEET_ROOT";

/// Default font family.
pub const C_FONT_NAME_DEFAULT: &str = "Meiryo UI";
/// Default font size in points.
pub const N_FONT_SIZE_DEFAULT: f64 = 10.0;
/// Width used when a column entry omits `width`.
pub const N_WIDTH_COLUMN_DEFAULT: f64 = 15.0;

/// Default sheet name for the generic test specification.
pub const C_SHEET_NAME_TEST_DEFAULT: &str = "テスト仕様書";
/// Default sheet name for unit tests.
pub const C_SHEET_NAME_UT_DEFAULT: &str = "単体試験";
/// Default sheet name for integration tests.
pub const C_SHEET_NAME_IT_DEFAULT: &str = "結合試験";

/// `# Section`
pub const C_PATTERN_SECTION_DEFAULT: &str = r"# (.+)";
/// `## Subsection`
pub const C_PATTERN_SUBSECTION_DEFAULT: &str = r"## (.+)";
/// `### Case` or `#### Case`
pub const C_PATTERN_TESTCASE_DEFAULT: &str = r"####? (.+)";
/// `1. Step`
pub const C_PATTERN_STEP_DEFAULT: &str = r"\d+\. (.+)";
/// `* [ ] Expectation`, `- [ ] Expectation`, `- [x] Expectation`
pub const C_PATTERN_EXPECTATION_DEFAULT: &str = r"[*-] \[[ xX]?\] (.+)";

/// Maximum number of primary columns (`A`..=`Z`).
pub const N_NCOLS_PRIMARY_MAX: usize = 26;

/// Default auxiliary header texts (tester, date, status, remarks).
pub fn derive_default_auxiliary_names() -> Vec<String> {
    ["確認者", "確認日", "結果", "備考"]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Default primary column layout: `NO`, three outline levels, steps, expectations.
pub fn derive_default_columns() -> Vec<SpecColumnConf> {
    let cfg_col = |key, name: &str, width, horizontal, merge| SpecColumnConf {
        key,
        name: name.to_string(),
        width,
        horizontal,
        vertical: EnumVerticalAlign::Top,
        merge,
    };

    vec![
        cfg_col(
            EnumColumnKey::No,
            "NO",
            8.0,
            EnumHorizontalAlign::Center,
            false,
        ),
        cfg_col(
            EnumColumnKey::Section,
            "大分類",
            18.0,
            EnumHorizontalAlign::Left,
            true,
        ),
        cfg_col(
            EnumColumnKey::Subsection,
            "中分類",
            18.0,
            EnumHorizontalAlign::Left,
            true,
        ),
        cfg_col(
            EnumColumnKey::Testcase,
            "小分類",
            24.0,
            EnumHorizontalAlign::Left,
            false,
        ),
        cfg_col(
            EnumColumnKey::Step,
            "試験内容",
            40.0,
            EnumHorizontalAlign::Left,
            false,
        ),
        cfg_col(
            EnumColumnKey::Expectation,
            "確認事項",
            40.0,
            EnumHorizontalAlign::Left,
            false,
        ),
    ]
}
