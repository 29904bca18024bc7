use serde::Serialize;

use crate::install::{install_app, uninstall_package};
use crate::instrument::{InstrumentationRun, TestCaseResult};
use crate::suite::Harness;
use crate::Error;

const APK: &str = "CtsPreconditionsApp.apk";
const PACKAGE: &str = "com.android.cts.preconditions";
const RUNNER: &str = "android.support.test.runner.AndroidJUnitRunner";

/// What the device side preconditions app found
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreconditionReport {
    pub failures: Vec<TestCaseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_failure: Option<String>,
}

impl PreconditionReport {
    pub fn met(&self) -> bool {
        self.failures.is_empty() && self.run_failure.is_none()
    }
}

/// Instrument the preconditions app (screen unlocked, external storage
/// present) before any suite runs.
///
/// Unmet preconditions are only warned about, suites may still pass on such
/// a device. Not finding the APK is an error.
pub fn check_device_preconditions(h: &Harness) -> crate::Result<PreconditionReport> {
    let apk = h
        .apps()?
        .get(APK)
        .map_err(|_| Error::Harness(format!("couldn't find {} to instrument", APK)))?;

    install_app(h.adb(), &apk)?;
    let res = InstrumentationRun::new(PACKAGE).runner(RUNNER).run(h.adb());
    if let Err(e) = uninstall_package(h.adb(), PACKAGE) {
        log::warn!("failed to uninstall {}: {}", PACKAGE, e);
    }
    let run = res?;

    let report = PreconditionReport {
        failures: run
            .tests
            .into_iter()
            .filter(|it| it.status.is_failure())
            .collect(),
        run_failure: run.run_failure,
    };

    for test in &report.failures {
        log::warn!(
            "precondition test {} failed.\n{}",
            test.name,
            test.stack.as_deref().unwrap_or("")
        );
    }
    if let Some(msg) = &report.run_failure {
        log::warn!("device side preconditions test run failed: {}", msg);
    }
    if !report.met() {
        log::warn!("not all device side preconditions met, tests may fail as a result");
    }
    Ok(report)
}
