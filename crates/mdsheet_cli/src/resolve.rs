//! Package root, config, output, and template resolution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use mdsheet_conf::{C_ENV_PACKAGE_ROOT, C_FILE_NAME_CONF, ConfError, SpecConvertConf, load_conf};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::conf::{C_EXT_OUTPUT, C_PATH_TEMPLATE_REL};

/// Where the workbook will start from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTemplateChoice {
    /// Workbook to start from, if any.
    pub path_template: Option<PathBuf>,
    /// Non-fatal notes for the user.
    pub warnings: Vec<String>,
}

/// Package root from the environment, the executable directory, or the working directory.
pub fn resolve_package_root() -> PathBuf {
    let path_exe_dir = std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(Path::to_path_buf));
    derive_package_root(
        std::env::var_os(C_ENV_PACKAGE_ROOT),
        path_exe_dir,
        std::env::current_dir().ok(),
    )
}

/// First usable candidate among the env override, the exe directory, and the cwd.
pub fn derive_package_root(
    env_root: Option<OsString>,
    path_exe_dir: Option<PathBuf>,
    path_cwd: Option<PathBuf>,
) -> PathBuf {
    env_root
        .filter(|val| !val.is_empty())
        .map(PathBuf::from)
        .or(path_exe_dir)
        .or(path_cwd)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load the explicit config, else `config.yaml` under the root, else built-in defaults.
pub fn resolve_conf(
    path_conf_cli: Option<&Path>,
    path_root: &Path,
) -> Result<SpecConvertConf, ConfError> {
    if let Some(path_conf) = path_conf_cli {
        info!(path = %path_conf.display(), "using config");
        return load_conf(path_conf);
    }

    let path_conf = path_root.join(C_FILE_NAME_CONF);
    if path_conf.is_file() {
        info!(path = %path_conf.display(), "using config");
        return load_conf(&path_conf);
    }

    info!(root = %path_root.display(), "no config file found; using built-in defaults");
    Ok(SpecConvertConf::default())
}

/// `<stem>.xlsx` next to the input.
pub fn derive_output_path(path_input: &Path) -> PathBuf {
    path_input.with_extension(C_EXT_OUTPUT)
}

/// Bundled template location under the package root.
pub fn derive_bundled_template_path(path_root: &Path) -> PathBuf {
    C_PATH_TEMPLATE_REL
        .iter()
        .fold(path_root.to_path_buf(), |path, part| path.join(part))
}

/// Decide the starting workbook.
///
/// A requested template that does not exist degrades to a fresh workbook. Without a
/// template request an existing output is updated in place.
pub fn resolve_template(cli: &Cli, path_root: &Path, path_file_out: &Path) -> SpecTemplateChoice {
    let mut l_warnings = Vec::new();

    let path_template = if cli.if_template() {
        let path_template = cli
            .template_path
            .clone()
            .unwrap_or_else(|| derive_bundled_template_path(path_root));
        if path_template.is_file() {
            info!(path = %path_template.display(), "using template workbook");
            Some(path_template)
        } else {
            warn!(path = %path_template.display(), "template workbook not found");
            l_warnings.push(format!(
                "Template file {} not found; creating a new workbook.",
                path_template.display()
            ));
            None
        }
    } else if path_file_out.is_file() {
        info!(path = %path_file_out.display(), "updating existing workbook in place");
        Some(path_file_out.to_path_buf())
    } else {
        None
    };

    SpecTemplateChoice {
        path_template,
        warnings: l_warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn derive_cli(l_args: &[&str]) -> Cli {
        let mut l_argv = vec!["md2xlsx"];
        l_argv.extend_from_slice(l_args);
        Cli::try_parse_from(l_argv).unwrap()
    }

    #[test]
    fn package_root_precedence() {
        let path_exe = PathBuf::from("/opt/md2xlsx");
        let path_cwd = PathBuf::from("/work");

        assert_eq!(
            derive_package_root(
                Some(OsString::from("/env")),
                Some(path_exe.clone()),
                Some(path_cwd.clone())
            ),
            PathBuf::from("/env")
        );
        assert_eq!(
            derive_package_root(
                Some(OsString::new()),
                Some(path_exe.clone()),
                Some(path_cwd.clone())
            ),
            path_exe
        );
        assert_eq!(derive_package_root(None, None, Some(path_cwd.clone())), path_cwd);
        assert_eq!(derive_package_root(None, None, None), PathBuf::from("."));
    }

    #[test]
    fn output_path_sits_next_to_input() {
        assert_eq!(
            derive_output_path(Path::new("docs/login.md")),
            PathBuf::from("docs/login.xlsx")
        );
        assert_eq!(
            derive_bundled_template_path(Path::new("/pkg")),
            PathBuf::from("/pkg/assets/template.xlsx")
        );
    }

    #[test]
    fn config_falls_back_to_defaults() {
        let dir_tmp = tempfile::tempdir().unwrap();
        let cfg_conf = resolve_conf(None, dir_tmp.path()).unwrap();
        assert_eq!(cfg_conf, SpecConvertConf::default());

        std::fs::write(
            dir_tmp.path().join("config.yaml"),
            "excel_settings:\n  font_size: 12\n",
        )
        .unwrap();
        let cfg_conf = resolve_conf(None, dir_tmp.path()).unwrap();
        assert_eq!(cfg_conf.excel_settings.font_size, 12.0);

        let err = resolve_conf(Some(&dir_tmp.path().join("missing.yaml")), dir_tmp.path())
            .unwrap_err();
        assert!(matches!(err, ConfError::Read { .. }));
    }

    #[test]
    fn template_choice() {
        let dir_tmp = tempfile::tempdir().unwrap();
        let path_out = dir_tmp.path().join("cases.xlsx");

        let choice = resolve_template(&derive_cli(&["-f", "cases.md"]), dir_tmp.path(), &path_out);
        assert_eq!(choice.path_template, None);
        assert!(choice.warnings.is_empty());

        let choice = resolve_template(
            &derive_cli(&["-f", "cases.md", "--template"]),
            dir_tmp.path(),
            &path_out,
        );
        assert_eq!(choice.path_template, None);
        assert_eq!(choice.warnings.len(), 1);

        std::fs::write(&path_out, b"x").unwrap();
        let choice = resolve_template(&derive_cli(&["-f", "cases.md"]), dir_tmp.path(), &path_out);
        assert_eq!(choice.path_template, Some(path_out.clone()));

        let path_bundled = derive_bundled_template_path(dir_tmp.path());
        std::fs::create_dir_all(path_bundled.parent().unwrap()).unwrap();
        std::fs::write(&path_bundled, b"x").unwrap();
        let choice = resolve_template(
            &derive_cli(&["-f", "cases.md", "--template"]),
            dir_tmp.path(),
            &path_out,
        );
        assert_eq!(choice.path_template, Some(path_bundled));
    }
}
