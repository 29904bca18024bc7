use std::process::exit;

use clap::{self, Args};
use crossterm::style::Color;

use hostcts::instrument::{InstrumentationRun, TestRunResult, TestStatus};
use hostcts::{Context, DefaultContext};

use crate::printer::Printer;
use crate::utils::{get_adb, print_json};

#[derive(Args)]
pub struct Instrument {
    /// Test class, a leading `.` is relative to the package
    #[arg(short, long)]
    class: Option<String>,

    /// Test method, requires --class
    #[arg(short, long, requires = "class")]
    method: Option<String>,

    /// Run the instrumentation as this user
    #[arg(short, long)]
    user: Option<i32>,

    /// Instrumentation runner, defaults to the harness config
    #[arg(short, long)]
    runner: Option<String>,

    /// Extra `am instrument` arguments such as `-e key value`
    #[arg(short = 'e', long = "param", allow_hyphen_values = true)]
    params: Vec<String>,

    /// Print the results as JSON
    #[arg(short, long)]
    json: bool,

    /// The test package
    #[arg()]
    package: String,
}

impl Instrument {
    pub fn run(&self) -> anyhow::Result<()> {
        let ctx = DefaultContext::new();
        let adb = get_adb(&ctx)?;

        let runner = match &self.runner {
            Some(r) => r.clone(),
            None => ctx.get_harness_config()?.instrumentation_runner,
        };
        let mut run = InstrumentationRun::new(&self.package).runner(&runner);
        if let Some(class) = &self.class {
            run = run.class(class);
        }
        if let Some(method) = &self.method {
            run = run.method(method);
        }
        if let Some(user) = self.user {
            run = run.user(user);
        }
        for param in &self.params {
            run = run.param(param.as_str());
        }

        let res = run.run(&adb)?;
        if self.json {
            print_json(&res)?;
        } else {
            print_result(&res);
        }
        if !res.passed() {
            exit(1);
        }
        Ok(())
    }
}

fn print_result(res: &TestRunResult) {
    let printer = Printer::new();
    for test in &res.tests {
        let color = match test.status {
            TestStatus::Passed => Color::Green,
            TestStatus::Ignored | TestStatus::AssumptionFailure => Color::Yellow,
            TestStatus::Failed | TestStatus::Incomplete => Color::Red,
        };
        printer.print("[ ");
        printer.print_colored(test.status, color);
        printer.println(format!(" ] {}", test));
        if test.status.is_failure() {
            if let Some(stack) = &test.stack {
                for line in stack.lines() {
                    printer.println(format!("    {}", line));
                }
            }
        }
    }
    let color = if res.passed() { Color::Green } else { Color::Red };
    printer.println_colored(res.summary(), color);
}
