use std::fmt::{self, Display};
use std::time::Instant;

use serde::Serialize;

use crate::adb::Adb;
use crate::config::HarnessConfig;
use crate::install::TestApps;
use crate::instrument::InstrumentationRun;
use crate::monitor::EventMonitor;
use crate::wait::WaitPolicy;
use crate::{device, Context, Error};

pub mod dumpsys;
pub mod launcher;
pub mod preconditions;
pub mod run_as;
pub mod selinux;
pub mod splits;
pub mod trusted_voice;

/// What a test that didn't fail concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    /// The device can't run the test, for example its API level is too low
    Skipped(String),
}

impl Verdict {
    pub fn skipped<S: ToString + ?Sized>(reason: &S) -> Self {
        Self::Skipped(reason.to_string())
    }
}

/// A host side test suite.
///
/// [run_suite] calls `set_up`, the test and `tear_down` for every selected
/// test.
pub trait HostTest {
    fn name(&self) -> &'static str;

    fn test_names(&self) -> &'static [&'static str];

    fn set_up(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn run_test(&mut self, test: &str) -> crate::Result<Verdict>;

    fn tear_down(&mut self) -> crate::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Skipped { reason: String },
    /// An assertion about the device's behavior didn't hold
    Failed { message: String },
    /// The test couldn't be carried out
    Error { message: String },
}

impl Outcome {
    fn from_result(res: crate::Result<Verdict>) -> Self {
        match res {
            Ok(Verdict::Passed) => Self::Passed,
            Ok(Verdict::Skipped(reason)) => Self::Skipped { reason },
            Err(e) if e.is_assertion() => Self::Failed {
                message: e.to_string(),
            },
            Err(e) => Self::Error {
                message: e.to_string(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Passed | Self::Skipped { .. })
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Skipped { reason } => write!(f, "SKIPPED ({})", reason),
            Self::Failed { message } => write!(f, "FAILED: {}", message),
            Self::Error { message } => write!(f, "ERROR: {}", message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub suite: String,
    pub test: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub duration_ms: u128,
}

pub enum Event {
    Started { suite: String, test: String },
    Finished(TestOutcome),
}

/// Run the tests of `suite` named in `only`, or every test when `only` is
/// empty.
///
/// `tear_down` runs after every test that got as far as `set_up`. A failing
/// `tear_down` is logged and never replaces the test's outcome.
pub fn run_suite(
    suite: &mut dyn HostTest,
    only: &[String],
    mon: &dyn EventMonitor<Event>,
) -> crate::Result<Vec<TestOutcome>> {
    let all = suite.test_names();
    if let Some(unknown) = only.iter().find(|it| !all.iter().any(|t| t == it)) {
        return Err(Error::Generic(format!(
            "suite {} has no test named {}",
            suite.name(),
            unknown
        )));
    }

    let mut outcomes = Vec::new();
    for test in all.iter().filter(|t| only.is_empty() || only.iter().any(|o| o == *t)) {
        mon.on_event(Event::Started {
            suite: suite.name().into(),
            test: test.to_string(),
        });
        log::info!("running {}#{}", suite.name(), test);
        let start = Instant::now();

        let res = match suite.set_up() {
            Ok(()) => suite.run_test(test),
            Err(e) => {
                log::error!("set up for {}#{} failed: {}", suite.name(), test, e);
                Err(match e {
                    Error::Assertion(msg) => Error::Harness(format!("set up failed: {}", msg)),
                    e => e,
                })
            }
        };

        if let Err(e) = suite.tear_down() {
            log::warn!("tear down after {}#{} failed: {}", suite.name(), test, e);
        }

        let outcome = TestOutcome {
            suite: suite.name().into(),
            test: test.to_string(),
            outcome: Outcome::from_result(res),
            duration_ms: start.elapsed().as_millis(),
        };
        log::info!("{}#{}: {}", outcome.suite, outcome.test, outcome.outcome);
        mon.on_event(Event::Finished(outcome.clone()));
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Everything a suite needs to talk to the device under test
pub struct Harness<'a> {
    ctx: &'a dyn Context,
    adb: &'a dyn Adb,
    config: HarnessConfig,
}

impl<'a> Harness<'a> {
    pub fn new(ctx: &'a dyn Context, adb: &'a dyn Adb) -> crate::Result<Self> {
        Ok(Self::with_config(ctx, adb, ctx.get_harness_config()?))
    }

    pub fn with_config(ctx: &'a dyn Context, adb: &'a dyn Adb, config: HarnessConfig) -> Self {
        Self { ctx, adb, config }
    }

    pub fn ctx(&self) -> &'a dyn Context {
        self.ctx
    }

    pub fn adb(&self) -> &'a dyn Adb {
        self.adb
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn wait(&self) -> WaitPolicy {
        self.config.wait
    }

    pub fn api_level(&self) -> crate::Result<u32> {
        self.ctx.get_target_api_level()
    }

    pub fn apps(&self) -> crate::Result<TestApps> {
        Ok(TestApps::new(self.ctx.get_apk_dir()?))
    }

    /// The configured ABI, or the device's primary one
    pub fn abi(&self) -> crate::Result<String> {
        match &self.config.abi {
            Some(abi) => Ok(abi.clone()),
            None => device::get_primary_abi(self.adb),
        }
    }

    pub fn instrumentation(&self, package: &str) -> InstrumentationRun {
        InstrumentationRun::new(package).runner(&self.config.instrumentation_runner)
    }

    /// Run device side tests as the owner and require them to pass
    pub fn run_device_tests(&self, package: &str, class: &str, method: &str) -> crate::Result<()> {
        self.instrumentation(package)
            .class(class)
            .method(method)
            .run_expecting_pass(self.adb)?;
        Ok(())
    }
}

pub struct SuiteInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub tests: &'static [&'static str],
}

pub static SUITES: &[SuiteInfo] = &[
    SuiteInfo {
        name: dumpsys::NAME,
        description: "validate the dumpsys checkin formats",
        tests: dumpsys::TESTS,
    },
    SuiteInfo {
        name: splits::NAME,
        description: "split APK installs through pm install sessions",
        tests: splits::TESTS,
    },
    SuiteInfo {
        name: launcher::NAME,
        description: "LauncherApps across users",
        tests: launcher::TESTS,
    },
    SuiteInfo {
        name: selinux::NAME,
        description: "no permissive SELinux domains",
        tests: selinux::TESTS,
    },
    SuiteInfo {
        name: run_as::NAME,
        description: "run-as for debuggable apps",
        tests: run_as::TESTS,
    },
    SuiteInfo {
        name: trusted_voice::NAME,
        description: "trusted voice activity runs on a locked device",
        tests: trusted_voice::TESTS,
    },
];

pub fn find_suite(name: &str) -> Option<&'static SuiteInfo> {
    SUITES.iter().find(|it| it.name == name)
}

pub fn new_suite<'a>(name: &str, harness: &'a Harness<'a>) -> crate::Result<Box<dyn HostTest + 'a>> {
    let suite: Box<dyn HostTest + 'a> = match name {
        dumpsys::NAME => Box::new(dumpsys::DumpsysSuite::new(harness)),
        splits::NAME => Box::new(splits::SplitsSuite::new(harness)),
        launcher::NAME => Box::new(launcher::LauncherMultiUserSuite::new(harness)),
        selinux::NAME => Box::new(selinux::SelinuxSuite::new(harness)),
        run_as::NAME => Box::new(run_as::RunAsSuite::new(harness)),
        trusted_voice::NAME => Box::new(trusted_voice::TrustedVoiceSuite::new(harness)),
        _ => return Err(Error::Generic(format!("unknown suite {}", name))),
    };
    Ok(suite)
}
