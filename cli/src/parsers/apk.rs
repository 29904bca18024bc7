use std::path::PathBuf;

use clap::builder::{PathBufValueParser, TypedValueParser};
use hostcts::utils::path_has_ext;

use crate::parsers::simple_error;

/// An existing `.apk` file on the host
#[derive(Clone)]
pub struct ApkPathValueParser;

impl TypedValueParser for ApkPathValueParser {
    type Value = PathBuf;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let path = PathBufValueParser::new().parse_ref(cmd, arg, value)?;
        if !path_has_ext(&path, "apk") {
            return Err(simple_error(format!(
                "{} is not an APK",
                path.to_string_lossy()
            )));
        }
        if !path.is_file() {
            return Err(simple_error(format!(
                "{} doesn't exist",
                path.to_string_lossy()
            )));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;
    use std::ffi::OsStr;

    #[rstest]
    fn test_apk_path() {
        let cmd = clap::Command::new("test");
        let dir = std::env::temp_dir();
        let apk = dir.join("hostcts_cli_parser_test.apk");
        std::fs::write(&apk, b"PK").unwrap();

        let parsed = ApkPathValueParser.parse_ref(&cmd, None, apk.as_os_str());
        std::fs::remove_file(&apk).unwrap();
        assert_eq!(parsed.unwrap(), apk);

        assert!(ApkPathValueParser
            .parse_ref(&cmd, None, OsStr::new("/definitely/not/here.apk"))
            .is_err());
        assert!(ApkPathValueParser
            .parse_ref(&cmd, None, OsStr::new("Cargo.toml"))
            .is_err());
    }
}
