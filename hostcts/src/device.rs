use std::collections::HashSet;

use crate::adb::Adb;
use crate::response::parse_features;
use crate::Error;

/// Read a system property, empty when it isn't set
pub fn get_prop(adb: &dyn Adb, prop: &str) -> crate::Result<String> {
    let out = adb.shell(&format!("getprop {}", prop))?.err_on_status()?;
    Ok(out.stdout_utf8_lossy().trim().to_string())
}

pub fn get_api_level(adb: &dyn Adb) -> crate::Result<u32> {
    let level = get_prop(adb, "ro.build.version.sdk")?;
    level
        .parse::<u32>()
        .map_err(|_| Error::Generic(format!("invalid api level `{}`", level)))
}

/// The ABI the device prefers, used when no ABI is configured
pub fn get_primary_abi(adb: &dyn Adb) -> crate::Result<String> {
    let abi = get_prop(adb, "ro.product.cpu.abi")?;
    if abi.is_empty() {
        return Err(Error::Generic("device reports no primary ABI".into()));
    }
    Ok(abi)
}

pub fn get_features(adb: &dyn Adb) -> crate::Result<HashSet<String>> {
    let out = adb.shell_text("pm list features")?;
    parse_features(&out)
}

/// Whether the device has every one of `required`. The first missing feature
/// is logged.
pub fn has_features(adb: &dyn Adb, required: &[&str]) -> crate::Result<bool> {
    let features = get_features(adb)?;
    for feature in required {
        if !features.contains(*feature) {
            log::info!("device doesn't have required feature {}", feature);
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn has_feature(adb: &dyn Adb, feature: &str) -> crate::Result<bool> {
    has_features(adb, &[feature])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{mock_adb, ok_output, MockAdb};
    use mockall::predicate::eq;
    use rstest::*;

    #[rstest]
    fn test_get_api_level(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .with(eq("getprop ro.build.version.sdk"))
            .times(1)
            .returning(|_| ok_output("34\n"));
        assert_eq!(get_api_level(&mock_adb).unwrap(), 34);
    }

    #[rstest]
    fn test_get_api_level_garbage(mut mock_adb: MockAdb) {
        mock_adb.expect_shell().returning(|_| ok_output("\n"));
        assert!(get_api_level(&mock_adb).is_err());
        assert!(get_primary_abi(&mock_adb).is_err());
    }

    #[rstest]
    fn test_has_features(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .with(eq("pm list features"))
            .returning(|_| {
                ok_output("feature:android.software.device_admin\nfeature:android.software.managed_users\n")
            });
        assert!(has_features(
            &mock_adb,
            &["android.software.device_admin", "android.software.managed_users"]
        )
        .unwrap());
        assert!(!has_feature(&mock_adb, "android.software.live_tv").unwrap());
    }

    #[rstest]
    fn test_malformed_features(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .returning(|_| ok_output("android.software.live_tv\n"));
        assert!(get_features(&mock_adb).unwrap_err().is_assertion());
    }
}
