use std::path::PathBuf;

use crate::install::{uninstall_package, InstallMultiple, TestApps};
use crate::suite::{Harness, HostTest, Verdict};
use crate::Error;

pub const NAME: &str = "splits";

const PKG: &str = "com.android.cts.splitapp";
const CLASS: &str = ".SplitAppTest";

const APK: &str = "CtsSplitApp.apk";

const APK_MDPI: &str = "CtsSplitApp_mdpi-v4.apk";
const APK_HDPI: &str = "CtsSplitApp_hdpi-v4.apk";
const APK_XHDPI: &str = "CtsSplitApp_xhdpi-v4.apk";
const APK_XXHDPI: &str = "CtsSplitApp_xxhdpi-v4.apk";

const APK_V7: &str = "CtsSplitApp_v7.apk";
const APK_FR: &str = "CtsSplitApp_fr.apk";
const APK_DE: &str = "CtsSplitApp_de.apk";

const APK_DIFF_REVISION: &str = "CtsSplitAppDiffRevision.apk";
const APK_DIFF_REVISION_V7: &str = "CtsSplitAppDiffRevision_v7.apk";

const APK_DIFF_VERSION: &str = "CtsSplitAppDiffVersion.apk";
const APK_DIFF_VERSION_V7: &str = "CtsSplitAppDiffVersion_v7.apk";

const APK_DIFF_CERT_V7: &str = "CtsSplitAppDiffCert_v7.apk";

const APK_FEATURE: &str = "CtsSplitAppFeature.apk";
const APK_FEATURE_V7: &str = "CtsSplitAppFeature_v7.apk";

pub const TESTS: &[&str] = &[
    "single_base",
    "density_single",
    "density_all",
    "density_best",
    "api",
    "locale",
    "native_single",
    "native_single_natural",
    "native_all",
    "native_all_natural",
    "duplicate_base",
    "duplicate_split",
    "diff_cert",
    "diff_cert_inherit",
    "diff_version",
    "diff_version_inherit",
    "diff_revision",
    "diff_revision_inherit_base",
    "diff_revision_inherit_split",
    "diff_revision_downgrade",
    "feature_base",
    "feature_api",
    "clear_code_cache",
];

/// Split APK installs through `pm install-create/write/commit`
pub struct SplitsSuite<'a> {
    h: &'a Harness<'a>,
    apps: Option<TestApps>,
    abi: Option<String>,
}

impl<'a> SplitsSuite<'a> {
    pub fn new(h: &'a Harness<'a>) -> Self {
        Self {
            h,
            apps: None,
            abi: None,
        }
    }

    fn abi(&self) -> crate::Result<&str> {
        self.abi
            .as_deref()
            .ok_or_else(|| Error::Harness("splits suite used before set up".into()))
    }

    fn apk(&self, name: &str) -> crate::Result<PathBuf> {
        match &self.apps {
            Some(apps) => apps.get(name),
            None => Err(Error::Harness("splits suite used before set up".into())),
        }
    }

    /// The split carrying native code for the ABI under test
    fn native_apk(&self) -> crate::Result<&'a str> {
        self.h.config().abi_splits.must_get(self.abi()?)
    }

    fn all_native_apks(&self) -> Vec<&'a str> {
        self.h.config().abi_splits.apks().collect()
    }

    fn install(&self, apks: &[&str]) -> crate::Result<InstallMultiple<'a>> {
        let mut inst = InstallMultiple::new(self.h.adb(), self.abi()?);
        for apk in apks {
            inst = inst.add_apk(self.apk(apk)?);
        }
        Ok(inst)
    }

    /// Layer `apks` over the installed package
    fn inherit(&self, apks: &[&str]) -> crate::Result<InstallMultiple<'a>> {
        let mut inst = InstallMultiple::new(self.h.adb(), self.abi()?).inherit_from(PKG);
        for apk in apks {
            inst = inst.add_apk(self.apk(apk)?);
        }
        Ok(inst)
    }

    fn device_test(&self, method: &str) -> crate::Result<()> {
        self.h.run_device_tests(PKG, CLASS, method)
    }

    fn install_and_check(&self, apks: &[&str], method: &str) -> crate::Result<Verdict> {
        self.install(apks)?.run()?;
        self.device_test(method)?;
        Ok(Verdict::Passed)
    }

    fn expect_rejected(&self, apks: &[&str]) -> crate::Result<Verdict> {
        self.install(apks)?.run_expecting_failure()?;
        Ok(Verdict::Passed)
    }

    fn native(&self, all: bool, natural: bool) -> crate::Result<Verdict> {
        let mut apks = vec![APK];
        if all {
            apks.extend(self.all_native_apks());
        } else {
            apks.push(self.native_apk()?);
        }
        let mut inst = self.install(&apks)?;
        if natural {
            inst = inst.use_natural_abi();
        }
        inst.run()?;
        self.device_test("testNative")?;
        Ok(Verdict::Passed)
    }
}

impl<'a> HostTest for SplitsSuite<'a> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn test_names(&self) -> &'static [&'static str] {
        TESTS
    }

    fn set_up(&mut self) -> crate::Result<()> {
        self.apps = Some(self.h.apps()?);
        self.abi = Some(self.h.abi()?);
        uninstall_package(self.h.adb(), PKG)
    }

    fn run_test(&mut self, test: &str) -> crate::Result<Verdict> {
        match test {
            "single_base" => self.install_and_check(&[APK], "testSingleBase"),
            "density_single" => self.install_and_check(&[APK, APK_MDPI], "testDensitySingle"),
            "density_all" => self.install_and_check(
                &[APK, APK_MDPI, APK_HDPI, APK_XHDPI, APK_XXHDPI],
                "testDensityAll",
            ),
            "density_best" => {
                self.install(&[APK, APK_MDPI])?.run()?;
                self.device_test("testDensityBest1")?;
                // splice in a split with better resources
                self.inherit(&[APK_XXHDPI])?.run()?;
                self.device_test("testDensityBest2")?;
                Ok(Verdict::Passed)
            }
            "api" => self.install_and_check(&[APK, APK_V7], "testApi"),
            "locale" => self.install_and_check(&[APK, APK_DE, APK_FR], "testLocale"),
            "native_single" => self.native(false, false),
            "native_single_natural" => self.native(false, true),
            "native_all" => self.native(true, false),
            "native_all_natural" => self.native(true, true),
            "duplicate_base" => self.expect_rejected(&[APK, APK]),
            "duplicate_split" => self.expect_rejected(&[APK, APK_V7, APK_V7]),
            "diff_cert" => self.expect_rejected(&[APK, APK_DIFF_CERT_V7]),
            "diff_cert_inherit" => {
                self.install(&[APK])?.run()?;
                self.inherit(&[APK_DIFF_CERT_V7])?.run_expecting_failure()?;
                Ok(Verdict::Passed)
            }
            "diff_version" => self.expect_rejected(&[APK, APK_DIFF_VERSION_V7]),
            "diff_version_inherit" => {
                self.install(&[APK])?.run()?;
                self.inherit(&[APK_DIFF_VERSION_V7])?.run_expecting_failure()?;
                Ok(Verdict::Passed)
            }
            "diff_revision" => {
                self.install_and_check(&[APK, APK_DIFF_REVISION_V7], "testRevision0_12")
            }
            "diff_revision_inherit_base" => {
                self.install(&[APK, APK_V7])?.run()?;
                self.device_test("testRevision0_0")?;
                self.inherit(&[APK_DIFF_REVISION_V7])?.run()?;
                self.device_test("testRevision0_12")?;
                Ok(Verdict::Passed)
            }
            "diff_revision_inherit_split" => {
                self.install(&[APK, APK_V7])?.run()?;
                self.device_test("testRevision0_0")?;
                self.inherit(&[APK_DIFF_REVISION])?.run()?;
                self.device_test("testRevision12_0")?;
                Ok(Verdict::Passed)
            }
            "diff_revision_downgrade" => {
                self.install(&[APK, APK_DIFF_REVISION_V7])?.run()?;
                self.inherit(&[APK_V7])?.run_expecting_failure()?;
                Ok(Verdict::Passed)
            }
            "feature_base" => self.install_and_check(&[APK, APK_FEATURE], "testFeatureBase"),
            "feature_api" => {
                self.install_and_check(&[APK, APK_FEATURE, APK_FEATURE_V7], "testFeatureApi")
            }
            "clear_code_cache" => {
                self.install(&[APK])?.run()?;
                self.device_test("testCodeCacheWrite")?;
                self.install(&[APK_DIFF_VERSION])?.add_arg("-r").run()?;
                self.device_test("testCodeCacheRead")?;
                Ok(Verdict::Passed)
            }
            _ => Err(Error::Generic(format!("unknown test {}", test))),
        }
    }

    fn tear_down(&mut self) -> crate::Result<()> {
        uninstall_package(self.h.adb(), PKG)
    }
}
