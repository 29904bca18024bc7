use std::path::PathBuf;

use clap::{self, Args};
use crossterm::style::Color;
use itertools::Itertools;

use hostcts::checkin::{self, CheckinReport, Format};
use hostcts::utils::read_file;
use hostcts::DefaultContext;

use crate::parsers::FormatValueParser;
use crate::printer::Printer;
use crate::utils::{get_adb, print_json};

#[derive(Args)]
pub struct Checkin {
    /// The checkin format to validate
    #[arg(value_parser = FormatValueParser)]
    format: Format,

    /// Validate a saved dump instead of asking the device
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(short, long)]
    json: bool,
}

impl Checkin {
    pub fn run(&self) -> anyhow::Result<()> {
        let report = match &self.file {
            Some(path) => checkin::verify(self.format, &read_file(path)?)?,
            None => {
                let ctx = DefaultContext::new();
                let adb = get_adb(&ctx)?;
                checkin::fetch_and_verify(&adb, self.format)?
            }
        };

        if self.json {
            print_json(&report)?;
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &CheckinReport) {
    let printer = Printer::new();
    printer.print_colored("OK", Color::Green);
    printer.println(format!(
        " {} dump, {} records",
        report.format, report.records
    ));
    match report.version {
        Some(v) => printer.println(format!("version: {}", v)),
        None => printer.println("version: none declared"),
    }
    printer.println(format!("tags: {}", report.seen_tags.iter().join(", ")));
    if !report.unknown_tags.is_empty() {
        printer.println_colored(
            format!("unknown tags: {}", report.unknown_tags.iter().join(", ")),
            Color::Yellow,
        );
    }
}
