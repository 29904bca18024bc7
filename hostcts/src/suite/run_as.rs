use lazy_static::lazy_static;
use regex::Regex;

use crate::install::{install_app, uninstall_package};
use crate::suite::{Harness, HostTest, Verdict};
use crate::Error;

pub const NAME: &str = "run-as";

pub const TESTS: &[&str] = &["run_as"];

const PACKAGE: &str = "android.sample.app";
const APK: &str = "CtsCppToolsApp.apk";

/// App ids start above this
const FIRST_APP_UID: u32 = 10000;

lazy_static! {
    static ref UID: Regex = Regex::new(r"^uid=([0-9]+)").unwrap();
}

/// The host can run shell commands as a debuggable app
pub struct RunAsSuite<'a> {
    h: &'a Harness<'a>,
}

impl<'a> RunAsSuite<'a> {
    pub fn new(h: &'a Harness<'a>) -> Self {
        Self { h }
    }

    fn run_as(&self) -> crate::Result<Verdict> {
        let cmd = format!("run-as {} id -u", PACKAGE);
        let out = self.h.adb().shell_text(&cmd)?;
        let out = out.trim();
        let uid = UID
            .captures(out)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| {
                Error::Assertion(format!(
                    "unexpected result returned by adb shell command: \"{}\"",
                    out
                ))
            })?
            .as_str();
        crate::ensure!(
            uid.parse::<u32>().map_or(false, |it| it > FIRST_APP_UID),
            "invalid app id {}",
            uid
        );
        Ok(Verdict::Passed)
    }
}

impl<'a> HostTest for RunAsSuite<'a> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn test_names(&self) -> &'static [&'static str] {
        TESTS
    }

    fn set_up(&mut self) -> crate::Result<()> {
        uninstall_package(self.h.adb(), PACKAGE)?;
        let apk = self.h.apps()?.get(APK)?;
        install_app(self.h.adb(), &apk)
    }

    fn run_test(&mut self, test: &str) -> crate::Result<Verdict> {
        match test {
            "run_as" => self.run_as(),
            _ => Err(Error::Generic(format!("unknown test {}", test))),
        }
    }

    fn tear_down(&mut self) -> crate::Result<()> {
        uninstall_package(self.h.adb(), PACKAGE)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::testing::{mock_adb, ok_output, tmp_context, MockAdb, TestContext};
    use mockall::predicate::eq;
    use rstest::*;

    fn device(adb: &mut MockAdb, reply: &'static str) {
        adb.expect_shell()
            .with(eq("run-as android.sample.app id -u"))
            .returning(move |_| ok_output(reply));
    }

    #[rstest]
    #[case("uid=10057(u0_a57) gid=10057(u0_a57)\n", true)]
    #[case("uid=10057\n", true)]
    #[case("uid=2000(shell)\n", false)]
    #[case("run-as: Package 'android.sample.app' is unknown\n", false)]
    fn test_run_as(
        tmp_context: TestContext,
        mut mock_adb: MockAdb,
        #[case] reply: &'static str,
        #[case] passes: bool,
    ) {
        device(&mut mock_adb, reply);
        let h = Harness::with_config(&tmp_context, &mock_adb, HarnessConfig::default());
        let mut suite = RunAsSuite::new(&h);
        let res = suite.run_test("run_as");
        assert_eq!(res.is_ok(), passes, "{:?}", res);
        if let Err(e) = res {
            assert!(e.is_assertion());
        }
    }

    #[rstest]
    fn test_set_up_installs(tmp_context: TestContext, mut mock_adb: MockAdb) {
        let dir = tmp_context.to_abs("testcases");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(APK), b"PK").unwrap();

        mock_adb
            .expect_shell()
            .with(eq("pm list packages android.sample.app"))
            .returning(|_| ok_output("package:android.sample.app\n"));
        mock_adb
            .expect_uninstall()
            .with(eq("android.sample.app"))
            .times(1)
            .returning(|_| Ok(()));
        mock_adb
            .expect_install()
            .withf(|apk: &str| apk.ends_with("testcases/CtsCppToolsApp.apk"))
            .times(1)
            .returning(|_| Ok(()));

        let h = Harness::with_config(&tmp_context, &mock_adb, HarnessConfig::default());
        let mut suite = RunAsSuite::new(&h);
        suite.set_up().unwrap();
    }
}
