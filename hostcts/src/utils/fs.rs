use std::fs::{self, create_dir_all};
use std::io::{self, ErrorKind};
use std::path::Path;

pub fn ensure_dir_exists(p: &Path) -> io::Result<()> {
    if p.exists() {
        return Ok(());
    }

    create_dir_all(p)
}

/// Check to see if the given pathlike type has the given extension
pub fn path_has_ext<P: AsRef<Path> + ?Sized>(p: &P, ext: &str) -> bool {
    let path = p.as_ref();
    path.extension().map_or(false, |it| it == ext)
}

/// Calls `to_str` on the path and returns the string, panicking if that fails
pub fn path_must_str(path: &Path) -> &str {
    path.to_str().expect("valid paths")
}

/// Returns the filename of the path and panics if that fails
pub fn path_must_name(path: &Path) -> &str {
    path.file_name()
        .expect("valid paths")
        .to_str()
        .expect("valid paths")
}

pub fn read_file(path: &Path) -> crate::Result<String> {
    match fs::read_to_string(path) {
        Ok(v) => Ok(v),
        Err(e) => match e.kind() {
            ErrorKind::NotFound => Err(crate::Error::MissingFile(path_must_str(path).into())),
            _ => Err(e.into()),
        },
    }
}

#[cfg(test)]
mod test {
    use crate::testing::{tmp_context, TestContext};
    use crate::utils::{path_has_ext, path_must_name, read_file};
    use std::path::PathBuf;

    use rstest::*;

    #[rstest]
    fn test_path_has_ext() {
        let path = PathBuf::from("path").join("to").join("CtsSplitApp.apk");
        assert!(path_has_ext(&path, "apk"));
        assert!(!path_has_ext("/path/to/policy", "apk"));
        assert_eq!(path_must_name(&path), "CtsSplitApp.apk");
    }

    #[rstest]
    fn test_read_missing_file(tmp_context: TestContext) {
        let missing = tmp_context.to_abs("nope.toml");
        match read_file(&missing) {
            Err(crate::Error::MissingFile(f)) => assert!(f.ends_with("nope.toml")),
            other => panic!("expected MissingFile, got {:?}", other),
        }
    }
}
