use crate::install::{install_app, uninstall_package};
use crate::suite::{Harness, HostTest, Verdict};
use crate::Error;

pub const NAME: &str = "trusted-voice";

pub const TESTS: &[&str] = &["logcat"];

const PACKAGE: &str = "android.trustedvoice.app";
const APK: &str = "CtsTrustedVoiceApp.apk";
const ACTIVITY: &str = "TrustedVoiceActivity";
const TEST_STRING: &str = "TrustedVoiceTestString";

/// KEYCODE_POWER
const LOCK_KEYEVENT: u32 = 26;

fn start_command() -> String {
    format!(
        "am start -W -a android.intent.action.MAIN -n {}/{}.{}",
        PACKAGE, PACKAGE, ACTIVITY
    )
}

fn dump_command() -> String {
    format!("logcat -v brief -d {}:I '*:S'", ACTIVITY)
}

/// The message of the first brief format line mentioning the test string,
/// `I/TrustedVoiceActivity( 1234): TrustedVoiceTestString`
fn find_test_string(logs: &str) -> Option<&str> {
    let line = logs.lines().find(|it| it.contains(TEST_STRING))?;
    line.split(':').nth(1).map(str::trim)
}

/// An activity that dismisses the keyguard can still run, and log, on a
/// locked device
pub struct TrustedVoiceSuite<'a> {
    h: &'a Harness<'a>,
}

impl<'a> TrustedVoiceSuite<'a> {
    pub fn new(h: &'a Harness<'a>) -> Self {
        Self { h }
    }

    fn logcat(&self) -> crate::Result<Verdict> {
        let adb = self.h.adb();
        adb.shell_text("logcat -c")?;
        adb.shell_text(&format!("input keyevent {}", LOCK_KEYEVENT))?;
        let started = adb.shell_text(&start_command())?;
        log::debug!("activity start: {}", started.trim());

        let logs = adb.shell_text(&dump_command())?;
        let found = find_test_string(&logs).unwrap_or("");
        crate::ensure!(
            found == TEST_STRING,
            "test string does not match, expected \"{}\" but found \"{}\"",
            TEST_STRING,
            found
        );
        Ok(Verdict::Passed)
    }
}

impl<'a> HostTest for TrustedVoiceSuite<'a> {
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
            "logcat" => self.logcat(),
            _ => Err(Error::Generic(format!("unknown test {}", test))),
        }
    }

    fn tear_down(&mut self) -> crate::Result<()> {
        uninstall_package(self.h.adb(), PACKAGE)
    }
}
