use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::Serialize;

use crate::adb::Adb;

pub const DEFAULT_RUNNER: &str = "android.test.InstrumentationTestRunner";

const STATUS: &str = "INSTRUMENTATION_STATUS: ";
const STATUS_CODE: &str = "INSTRUMENTATION_STATUS_CODE: ";
const RESULT: &str = "INSTRUMENTATION_RESULT: ";
const CODE: &str = "INSTRUMENTATION_CODE: ";
const FAILED: &str = "INSTRUMENTATION_FAILED: ";

/// Runs device side tests with `am instrument -w -r` and collects the results
#[derive(Debug, Clone)]
pub struct InstrumentationRun {
    package: String,
    class: Option<String>,
    method: Option<String>,
    user: Option<i32>,
    params: Vec<String>,
    runner: String,
}

impl InstrumentationRun {
    pub fn new(package: &str) -> Self {
        Self {
            package: package.into(),
            class: None,
            method: None,
            user: None,
            params: Vec::new(),
            runner: DEFAULT_RUNNER.into(),
        }
    }

    /// A class starting with `.` is relative to the package
    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(if class.starts_with('.') {
            format!("{}{}", self.package, class)
        } else {
            class.into()
        });
        self
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn user(mut self, user_id: i32) -> Self {
        self.user = Some(user_id);
        self
    }

    /// Extra arguments placed before `-w`, for example `-e testUser 12`
    pub fn param<S: Into<String>>(mut self, param: S) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn runner(mut self, runner: &str) -> Self {
        self.runner = runner.into();
        self
    }

    pub fn command(&self) -> String {
        let mut cmd = String::from("am instrument");
        if let Some(user) = self.user {
            cmd.push_str(&format!(" --user {}", user));
        }
        for param in &self.params {
            cmd.push(' ');
            cmd.push_str(param);
        }
        cmd.push_str(" -w -r");
        if let Some(class) = &self.class {
            cmd.push_str(" -e class ");
            cmd.push_str(class);
            if let Some(method) = &self.method {
                cmd.push('#');
                cmd.push_str(method);
            }
        }
        cmd.push_str(&format!(" {}/{}", self.package, self.runner));
        cmd
    }

    pub fn run(&self, adb: &dyn Adb) -> crate::Result<TestRunResult> {
        let cmd = self.command();
        log::info!("running {}", cmd);
        let out = adb.shell_text(&cmd)?;
        let result = parse_instrumentation_output(&out);
        result.log();
        Ok(result)
    }

    /// Run and fail with an assertion unless [TestRunResult::passed]
    pub fn run_expecting_pass(&self, adb: &dyn Adb) -> crate::Result<TestRunResult> {
        let result = self.run(adb)?;
        if !result.passed() {
            return Err(crate::Error::Assertion(format!(
                "device tests failed for {}: {}",
                self.target(),
                result.summary()
            )));
        }
        Ok(result)
    }

    fn target(&self) -> String {
        match (&self.class, &self.method) {
            (Some(c), Some(m)) => format!("{}#{}", c, m),
            (Some(c), None) => c.clone(),
            _ => self.package.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Ignored,
    AssumptionFailure,
    /// Started but never reported an outcome
    Incomplete,
}

impl TestStatus {
    fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Passed,
            -1 | -2 => Self::Failed,
            -3 => Self::Ignored,
            -4 => Self::AssumptionFailure,
            _ => {
                log::warn!("unknown instrumentation status code {}", code);
                Self::Failed
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Incomplete)
    }
}

impl Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILURE",
            Self::Ignored => "IGNORED",
            Self::AssumptionFailure => "ASSUMPTION_FAILURE",
            Self::Incomplete => "INCOMPLETE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseResult {
    pub class: String,
    pub name: String,
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Display for TestCaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TestRunResult {
    pub tests: Vec<TestCaseResult>,
    /// Why the run as a whole failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_failure: Option<String>,
    /// The `INSTRUMENTATION_CODE` the run finished with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    pub result: BTreeMap<String, String>,
}

impl TestRunResult {
    pub fn count(&self, status: TestStatus) -> usize {
        self.tests.iter().filter(|it| it.status == status).count()
    }

    pub fn has_failed_tests(&self) -> bool {
        self.tests.iter().any(|it| it.status.is_failure())
    }

    /// No failures, no run failure and at least one test passed
    pub fn passed(&self) -> bool {
        !self.has_failed_tests()
            && self.run_failure.is_none()
            && self.count(TestStatus::Passed) > 0
    }

    pub fn summary(&self) -> String {
        let mut s = format!(
            "{} passed, {} failed, {} ignored",
            self.count(TestStatus::Passed),
            self.tests.iter().filter(|it| it.status.is_failure()).count(),
            self.count(TestStatus::Ignored) + self.count(TestStatus::AssumptionFailure)
        );
        if let Some(failure) = &self.run_failure {
            s.push_str(&format!(", run failed: {}", failure));
        }
        s
    }

    fn log(&self) {
        for test in &self.tests {
            log::info!("test {}: {}", test, test.status);
            if test.status != TestStatus::Passed {
                if let Some(stack) = &test.stack {
                    log::warn!("{}", stack);
                }
            }
        }
        if let Some(failure) = &self.run_failure {
            log::warn!("test run failed: {}", failure);
        }
    }
}

/// Which bundle a continuation line belongs to
enum Pending {
    None,
    Status(String),
    Result(String),
}

#[derive(Default)]
struct Bundle {
    values: BTreeMap<String, String>,
}

impl Bundle {
    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|it| it.as_str())
    }
}

struct Parser {
    pending: Pending,
    status: Bundle,
    current: Option<TestCaseResult>,
    run: TestRunResult,
}

fn split_key_value(s: &str) -> (&str, &str) {
    match s.split_once('=') {
        Some((k, v)) => (k.trim(), v),
        None => (s.trim(), ""),
    }
}

impl Parser {
    fn new() -> Self {
        Self {
            pending: Pending::None,
            status: Bundle::default(),
            current: None,
            run: TestRunResult::default(),
        }
    }

    fn feed(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix(STATUS) {
            let (k, v) = split_key_value(rest);
            self.status.values.insert(k.into(), v.into());
            self.pending = Pending::Status(k.into());
        } else if let Some(rest) = line.strip_prefix(STATUS_CODE) {
            self.pending = Pending::None;
            match rest.trim().parse::<i32>() {
                Ok(code) => self.status_code(code),
                Err(_) => log::warn!("bad status code line: {}", line),
            }
        } else if let Some(rest) = line.strip_prefix(RESULT) {
            let (k, v) = split_key_value(rest);
            self.run.result.insert(k.into(), v.into());
            self.pending = Pending::Result(k.into());
        } else if let Some(rest) = line.strip_prefix(CODE) {
            self.pending = Pending::None;
            self.run.code = rest.trim().parse::<i32>().ok();
        } else if let Some(rest) = line.strip_prefix(FAILED) {
            self.pending = Pending::None;
            self.run.run_failure = Some(rest.trim().into());
        } else {
            let target = match &self.pending {
                Pending::Status(k) => self.status.values.get_mut(k),
                Pending::Result(k) => self.run.result.get_mut(k),
                Pending::None => None,
            };
            if let Some(value) = target {
                value.push('\n');
                value.push_str(line);
            }
        }
    }

    fn status_code(&mut self, code: i32) {
        let bundle = std::mem::take(&mut self.status);
        let class = bundle.get("class").unwrap_or_default().to_string();
        let name = bundle.get("test").unwrap_or_default().to_string();

        if code == 1 {
            self.abandon_current();
            self.current = Some(TestCaseResult {
                class,
                name,
                status: TestStatus::Incomplete,
                stack: None,
            });
            return;
        }

        let mut test = match self.current.take() {
            Some(test) if test.class == class && test.name == name => test,
            other => {
                if let Some(other) = other {
                    self.run.tests.push(other);
                }
                log::debug!("status for {}#{} without a start", class, name);
                TestCaseResult {
                    class,
                    name,
                    status: TestStatus::Incomplete,
                    stack: None,
                }
            }
        };
        test.status = TestStatus::from_code(code);
        test.stack = bundle.get("stack").map(String::from);
        self.run.tests.push(test);
    }

    fn abandon_current(&mut self) {
        if let Some(test) = self.current.take() {
            self.run.tests.push(test);
        }
    }

    fn finish(mut self) -> TestRunResult {
        if self.current.is_some() {
            self.abandon_current();
            if self.run.run_failure.is_none() {
                self.run.run_failure = Some("test run incomplete".into());
            }
        }
        if self.run.run_failure.is_none() {
            if let Some(msg) = self.run.result.get("shortMsg") {
                self.run.run_failure = Some(msg.trim().to_string());
            } else if self.run.code.is_none() {
                self.run.run_failure = Some("instrumentation did not complete".into());
            }
        }
        self.run
    }
}

/// Parse the raw output of `am instrument -r`
pub fn parse_instrumentation_output(text: &str) -> TestRunResult {
    let mut parser = Parser::new();
    for line in text.lines() {
        parser.feed(line.trim_end_matches('\r'));
    }
    parser.finish()
}
