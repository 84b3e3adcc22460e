//! Source text loading.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::spec::MdReadError;

/// Read a UTF-8 outline document; a missing file is [`MdReadError::InputMissing`].
pub fn read_markdown_file(path: impl AsRef<Path>) -> Result<String, MdReadError> {
    let path_file = path.as_ref();
    fs::read_to_string(path_file).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            MdReadError::InputMissing(path_file.to_path_buf())
        } else {
            MdReadError::Io {
                path: path_file.to_path_buf(),
                source,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_input_missing() {
        let dir_tmp = tempfile::tempdir().unwrap();
        let err = read_markdown_file(dir_tmp.path().join("absent.md")).unwrap_err();
        assert!(matches!(err, MdReadError::InputMissing(_)));
        assert!(err.to_string().contains("absent.md"));
    }

    #[test]
    fn non_utf8_file_is_io_error() {
        let dir_tmp = tempfile::tempdir().unwrap();
        let path_file = dir_tmp.path().join("binary.md");
        fs::write(&path_file, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            read_markdown_file(&path_file),
            Err(MdReadError::Io { .. })
        ));
    }

    #[test]
    fn reads_utf8_text() {
        let dir_tmp = tempfile::tempdir().unwrap();
        let path_file = dir_tmp.path().join("spec.md");
        fs::write(&path_file, "# ログイン\n").unwrap();
        assert_eq!(read_markdown_file(&path_file).unwrap(), "# ログイン\n");
    }
}
