//! Encrypted file naming: `report.txt` becomes `report-txt.axx`

use std::path::{Path, PathBuf};

use axc_core::config::NamingConfig;
use axc_core::{AxcError, AxcResult};

/// Name for the encrypted form of `path`, in the same directory.
///
/// The original extension is folded into the stem with a dash and the
/// configured suffix appended. Asking for the encrypted name of a file that
/// already carries the suffix is a logic error in the caller.
pub fn create_encrypted_name(path: &Path, naming: &NamingConfig) -> AxcResult<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AxcError::InvalidArgument(format!("no usable file name in {path:?}")))?;

    if is_encrypted_name(path, naming) {
        return Err(AxcError::Internal(format!(
            "{file_name} is already an encrypted name"
        )));
    }

    let suffix = &naming.suffix;
    let encrypted = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{ext}.{suffix}"),
        _ => format!("{file_name}.{suffix}"),
    };
    Ok(path.with_file_name(encrypted))
}

pub fn is_encrypted_name(path: &Path, naming: &NamingConfig) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(&naming.suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axc_core::ErrorStatus;

    fn axx() -> NamingConfig {
        NamingConfig::default()
    }

    #[test]
    fn test_extension_folded_into_stem() {
        let name = create_encrypted_name(Path::new("/tmp/docs/report.txt"), &axx()).unwrap();
        assert_eq!(name, PathBuf::from("/tmp/docs/report-txt.axx"));
    }

    #[test]
    fn test_only_last_extension_folded() {
        let name = create_encrypted_name(Path::new("backup.tar.gz"), &axx()).unwrap();
        assert_eq!(name, PathBuf::from("backup.tar-gz.axx"));
    }

    #[test]
    fn test_no_extension() {
        let name = create_encrypted_name(Path::new("Makefile"), &axx()).unwrap();
        assert_eq!(name, PathBuf::from("Makefile.axx"));
        let name = create_encrypted_name(Path::new(".profile"), &axx()).unwrap();
        assert_eq!(name, PathBuf::from(".profile.axx"));
    }

    #[test]
    fn test_double_transform_is_internal_error() {
        let once = create_encrypted_name(Path::new("a.txt"), &axx()).unwrap();
        let err = create_encrypted_name(&once, &axx()).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::InternalError);

        let err = create_encrypted_name(Path::new("A-TXT.AXX"), &axx()).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::InternalError);
    }

    #[test]
    fn test_suffix_from_config() {
        let enc = NamingConfig {
            suffix: "enc".into(),
        };
        let name = create_encrypted_name(Path::new("photo.jpg"), &enc).unwrap();
        assert_eq!(name, PathBuf::from("photo-jpg.enc"));
        assert!(is_encrypted_name(&name, &enc));
        assert!(!is_encrypted_name(&name, &axx()));
    }

    #[test]
    fn test_root_has_no_file_name() {
        let err = create_encrypted_name(Path::new("/"), &axx()).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::InvalidArgument);
    }
}
