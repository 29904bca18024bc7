use std::time::Duration;

use crate::device;
use crate::install::{install_app, uninstall_package};
use crate::suite::{Harness, HostTest, Verdict};
use crate::users::{UserManager, OWNER_USER_ID};
use crate::Error;

pub const NAME: &str = "launcher-multi-user";

pub const TESTS: &[&str] = &[
    "get_activities_for_non_profile_fails",
    "no_launcher_callback_package_added_secondary_user",
];

const FEATURE_LIVE_TV: &str = "android.software.live_tv";

const SIMPLE_APP_PKG: &str = "com.android.cts.launcherapps.simpleapp";
const SIMPLE_APP_APK: &str = "CtsSimpleApp.apk";
const LAUNCHER_TESTS_PKG: &str = "com.android.cts.launchertests";
const LAUNCHER_TESTS_CLASS: &str = "com.android.cts.launchertests.LauncherAppsTests";
const LAUNCHER_TESTS_APK: &str = "CtsLauncherAppsTests.apk";
const LAUNCHER_TESTS_SUPPORT_PKG: &str = "com.android.cts.launchertests.support";
const LAUNCHER_TESTS_SUPPORT_APK: &str = "CtsLauncherAppsTestsSupport.apk";

/// The callback service gives no signal once it has registered
const CALLBACK_SERVICE_SETTLE: Duration = Duration::from_secs(5);

/// LauncherApps must not expose the apps of a user that isn't a profile of
/// the caller
pub struct LauncherMultiUserSuite<'a> {
    h: &'a Harness<'a>,
    users: UserManager<'a>,
    multi_user: bool,
    live_tv: bool,
    secondary_serial: Option<i32>,
}

impl<'a> LauncherMultiUserSuite<'a> {
    pub fn new(h: &'a Harness<'a>) -> Self {
        Self {
            h,
            users: UserManager::new(h.adb(), h.wait()),
            multi_user: false,
            live_tv: false,
            secondary_serial: None,
        }
    }

    fn install_test_apps(&self) -> crate::Result<()> {
        self.uninstall_test_apps()?;
        let apps = self.h.apps()?;
        install_app(self.h.adb(), &apps.get(LAUNCHER_TESTS_APK)?)?;
        install_app(self.h.adb(), &apps.get(LAUNCHER_TESTS_SUPPORT_APK)?)
    }

    fn uninstall_test_apps(&self) -> crate::Result<()> {
        uninstall_package(self.h.adb(), LAUNCHER_TESTS_PKG)?;
        uninstall_package(self.h.adb(), LAUNCHER_TESTS_SUPPORT_PKG)?;
        uninstall_package(self.h.adb(), SIMPLE_APP_PKG)
    }

    fn start_callback_service(&self) -> crate::Result<()> {
        let cmd = format!(
            "am startservice --user {} -a {}.REGISTER_CALLBACK {}/.LauncherCallbackTestsService",
            OWNER_USER_ID, LAUNCHER_TESTS_SUPPORT_PKG, LAUNCHER_TESTS_SUPPORT_PKG
        );
        let out = self.h.adb().shell_text(&cmd)?;
        log::info!("output for command {}: {}", cmd, out.trim());
        self.h.wait().settle(CALLBACK_SERVICE_SETTLE);
        Ok(())
    }

    fn skip_reason(&self) -> Option<&'static str> {
        if !self.multi_user {
            Some("multiple users not supported")
        } else if self.live_tv {
            Some("device has android.software.live_tv")
        } else {
            None
        }
    }

    /// Install the simple app and run `method` against the secondary user,
    /// uninstalling the app whatever the outcome
    fn run_against_secondary(&self, method: &str) -> crate::Result<Verdict> {
        let serial = self
            .secondary_serial
            .ok_or_else(|| Error::Harness("no secondary user".into()))?;
        let apps = self.h.apps()?;
        install_app(self.h.adb(), &apps.get(SIMPLE_APP_APK)?)?;

        let res = self
            .h
            .instrumentation(LAUNCHER_TESTS_PKG)
            .class(LAUNCHER_TESTS_CLASS)
            .method(method)
            .user(OWNER_USER_ID)
            .param(format!("-e testUser {}", serial))
            .run_expecting_pass(self.h.adb());

        if let Err(e) = uninstall_package(self.h.adb(), SIMPLE_APP_PKG) {
            log::warn!("failed to uninstall {}: {}", SIMPLE_APP_PKG, e);
        }
        res.map(|_| Verdict::Passed)
    }
}

impl<'a> HostTest for LauncherMultiUserSuite<'a> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn test_names(&self) -> &'static [&'static str] {
        TESTS
    }

    fn set_up(&mut self) -> crate::Result<()> {
        // LauncherApps needs API 21
        self.multi_user = self.users.supports_multiple_users()? && self.h.api_level()? >= 21;
        self.live_tv = device::has_feature(self.h.adb(), FEATURE_LIVE_TV)?;
        if !self.multi_user {
            return Ok(());
        }

        self.users.remove_all_secondary_users()?;
        self.install_test_apps()?;
        let user_id = self.users.create_user()?;
        self.secondary_serial = Some(self.users.get_user_serial_number(user_id)?);
        self.users.start_user(user_id)
    }

    fn run_test(&mut self, test: &str) -> crate::Result<Verdict> {
        if !TESTS.iter().any(|it| *it == test) {
            return Err(Error::Generic(format!("unknown test {}", test)));
        }
        if let Some(reason) = self.skip_reason() {
            return Ok(Verdict::skipped(reason));
        }
        match test {
            "get_activities_for_non_profile_fails" => {
                self.run_against_secondary("testGetActivitiesForUserFails")
            }
            _ => {
                self.start_callback_service()?;
                self.run_against_secondary("testNoPackageAddedCallbackForUser")
            }
        }
    }

    fn tear_down(&mut self) -> crate::Result<()> {
        if !self.multi_user {
            return Ok(());
        }
        self.users.tear_down();
        self.secondary_serial = None;
        self.uninstall_test_apps()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::testing::{mock_adb, ok_output, tmp_context, MockAdb, TestContext};
    use crate::wait::WaitPolicy;
    use rstest::*;
    use std::sync::{Arc, Mutex};

    const PASSED_RUN: &str = "\
INSTRUMENTATION_STATUS: class=com.android.cts.launchertests.LauncherAppsTests
INSTRUMENTATION_STATUS: test=t
INSTRUMENTATION_STATUS_CODE: 1
INSTRUMENTATION_STATUS: class=com.android.cts.launchertests.LauncherAppsTests
INSTRUMENTATION_STATUS: test=t
INSTRUMENTATION_STATUS_CODE: 0
INSTRUMENTATION_CODE: -1
";

    struct FakeDevice {
        max_users: i32,
        features: &'static str,
        users: Vec<(i32, bool)>,
        shell: Vec<String>,
    }

    impl FakeDevice {
        fn list_users(&self) -> String {
            let mut out = String::from("Users:\n");
            for (id, running) in &self.users {
                out.push_str(&format!(
                    "\tUserInfo{{{}:User{}:0}}{}\n",
                    id,
                    id,
                    if *running { " running" } else { "" }
                ));
            }
            out
        }

        fn handle(&mut self, cmd: &str) -> String {
            self.shell.push(cmd.to_string());
            if cmd == "pm get-max-users" {
                format!("Maximum supported users: {}\n", self.max_users)
            } else if cmd == "pm list features" {
                self.features.to_string()
            } else if cmd == "pm list users" {
                self.list_users()
            } else if cmd.starts_with("pm create-user") {
                self.users.push((12, false));
                "Success: created user id 12\n".into()
            } else if cmd == "dumpsys user" {
                "Users:\n  UserInfo{12:User12:0} serialNo=21\n".into()
            } else if let Some(id) = cmd.strip_prefix("am start-user ") {
                let id: i32 = id.parse().unwrap();
                for user in self.users.iter_mut().filter(|it| it.0 == id) {
                    user.1 = true;
                }
                "Success: user started\n".into()
            } else if let Some(id) = cmd.strip_prefix("pm remove-user ") {
                let id: i32 = id.parse().unwrap();
                self.users.retain(|it| it.0 != id);
                "Success: removed user\n".into()
            } else if cmd.starts_with("am instrument") {
                PASSED_RUN.into()
            } else {
                String::new()
            }
        }
    }

    fn fake_device(adb: &mut MockAdb, max_users: i32, features: &'static str) -> Arc<Mutex<FakeDevice>> {
        let dev = Arc::new(Mutex::new(FakeDevice {
            max_users,
            features,
            users: vec![(0, true), (10, false)],
            shell: Vec::new(),
        }));
        let shell_dev = Arc::clone(&dev);
        adb.expect_shell()
            .returning(move |cmd| ok_output(&shell_dev.lock().unwrap().handle(cmd)));
        adb.expect_install().returning(|_| Ok(()));
        adb.expect_uninstall().returning(|_| Ok(()));
        dev
    }

    fn with_apks(ctx: &TestContext) {
        let dir = ctx.to_abs("testcases");
        std::fs::create_dir_all(&dir).unwrap();
        for name in [SIMPLE_APP_APK, LAUNCHER_TESTS_APK, LAUNCHER_TESTS_SUPPORT_APK] {
            std::fs::write(dir.join(name), b"PK").unwrap();
        }
    }

    fn config() -> HarnessConfig {
        HarnessConfig {
            wait: WaitPolicy::new(
                Duration::from_secs(1),
                Duration::from_millis(1),
                Duration::from_millis(1),
            ),
            ..Default::default()
        }
    }

    #[rstest]
    fn test_full_cycle(tmp_context: TestContext, mut mock_adb: MockAdb) {
        with_apks(&tmp_context);
        let dev = fake_device(&mut mock_adb, 4, "feature:android.software.device_admin\n");
        let h = Harness::with_config(&tmp_context, &mock_adb, config());
        let mut suite = LauncherMultiUserSuite::new(&h);

        suite.set_up().unwrap();
        {
            let dev = dev.lock().unwrap();
            // the stale user 10 is gone, the new one is running
            assert_eq!(dev.users, vec![(0, true), (12, true)]);
        }
        assert_eq!(
            suite
                .run_test("no_launcher_callback_package_added_secondary_user")
                .unwrap(),
            Verdict::Passed
        );
        suite.tear_down().unwrap();

        let dev = dev.lock().unwrap();
        assert_eq!(dev.users, vec![(0, true)]);
        assert!(dev.shell.iter().any(|it| it.starts_with(
            "am startservice --user 0 -a com.android.cts.launchertests.support.REGISTER_CALLBACK"
        )));
        assert!(dev.shell.iter().any(|it| it.starts_with("am instrument --user 0 -e testUser 21 -w -r")));
    }

    #[rstest]
    fn test_single_user_device_skips(tmp_context: TestContext, mut mock_adb: MockAdb) {
        let dev = fake_device(&mut mock_adb, 1, "");
        let h = Harness::with_config(&tmp_context, &mock_adb, config());
        let mut suite = LauncherMultiUserSuite::new(&h);

        suite.set_up().unwrap();
        assert!(matches!(
            suite.run_test("get_activities_for_non_profile_fails").unwrap(),
            Verdict::Skipped(_)
        ));
        suite.tear_down().unwrap();
        assert!(!dev
            .lock()
            .unwrap()
            .shell
            .iter()
            .any(|it| it.starts_with("pm create-user")));
    }

    #[rstest]
    fn test_live_tv_skips(tmp_context: TestContext, mut mock_adb: MockAdb) {
        with_apks(&tmp_context);
        fake_device(&mut mock_adb, 4, "feature:android.software.live_tv\n");
        let h = Harness::with_config(&tmp_context, &mock_adb, config());
        let mut suite = LauncherMultiUserSuite::new(&h);

        suite.set_up().unwrap();
        assert!(matches!(
            suite.run_test("get_activities_for_non_profile_fails").unwrap(),
            Verdict::Skipped(_)
        ));
        suite.tear_down().unwrap();
    }
}
