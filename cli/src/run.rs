use std::process::exit;

use anyhow::bail;
use clap::{self, Args};
use crossterm::style::Color;
use itertools::Itertools;

use hostcts::monitor::FnMonitor;
use hostcts::suite::preconditions::check_device_preconditions;
use hostcts::suite::{find_suite, new_suite, run_suite, Event, Harness, TestOutcome, SUITES};
use hostcts::DefaultContext;

use crate::printer::Printer;
use crate::utils::{get_adb, print_json};

#[derive(Args)]
pub struct Run {
    /// Only run the named test, can be given multiple times
    ///
    /// Requires exactly one suite
    #[arg(short, long = "test")]
    tests: Vec<String>,

    /// Print the outcomes as JSON once every suite has finished
    #[arg(short, long)]
    json: bool,

    /// Don't check the device side preconditions before running
    #[arg(long)]
    skip_preconditions: bool,

    /// Suites to run, all of them if none are given
    #[arg()]
    suites: Vec<String>,
}

impl Run {
    pub fn run(&self) -> anyhow::Result<()> {
        if !self.tests.is_empty() && self.suites.len() != 1 {
            bail!("--test requires exactly one suite");
        }
        if let Some(unknown) = self.suites.iter().find(|it| find_suite(it).is_none()) {
            bail!(
                "unknown suite {}, expected one of: {}",
                unknown,
                SUITES.iter().map(|it| it.name).join(", ")
            );
        }

        let ctx = DefaultContext::new();
        let adb = get_adb(&ctx)?;
        let harness = Harness::new(&ctx, &adb)?;

        let names: Vec<&str> = if self.suites.is_empty() {
            SUITES.iter().map(|it| it.name).collect()
        } else {
            self.suites.iter().map(String::as_str).collect()
        };

        let printer = Printer::new();
        if self.skip_preconditions || harness.config().skip_preconditions {
            log::info!("skipping device side preconditions");
        } else if !check_device_preconditions(&harness)?.met() && !self.json {
            printer.println_colored(
                "not all device preconditions are met, tests may fail as a result",
                Color::Yellow,
            );
        }

        let json = self.json;
        let mon = FnMonitor::new(move |evt: Event| match evt {
            Event::Started { suite, test } => log::debug!("started {}#{}", suite, test),
            Event::Finished(outcome) if !json => Printer::new().print_outcome(&outcome),
            Event::Finished(_) => {}
        });

        let mut outcomes: Vec<TestOutcome> = Vec::new();
        for name in names {
            let mut suite = new_suite(name, &harness)?;
            outcomes.extend(run_suite(suite.as_mut(), &self.tests, &mon)?);
        }

        if self.json {
            print_json(&outcomes)?;
        } else {
            printer.println("");
            printer.print_summary(&outcomes);
        }

        if outcomes.iter().any(|it| !it.outcome.is_ok()) {
            exit(1);
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct ListSuites {
    /// Also list the tests in each suite
    #[arg(short, long)]
    tests: bool,
}

impl ListSuites {
    pub fn run(&self) -> anyhow::Result<()> {
        let printer = Printer::new();
        for suite in SUITES {
            printer.print_colored(suite.name, Color::Cyan);
            printer.println(format!(": {}", suite.description));
            if self.tests {
                for test in suite.tests {
                    printer.println(format!("    {}", test));
                }
            }
        }
        Ok(())
    }
}
