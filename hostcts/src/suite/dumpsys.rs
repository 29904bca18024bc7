use crate::checkin::{fetch_and_verify, Format};
use crate::suite::{Harness, HostTest, Verdict};

pub const NAME: &str = "dumpsys";

pub const TESTS: &[&str] = &["procstats_output", "batterystats_output"];

/// Checks that the checkin output of `dumpsys procstats` and
/// `dumpsys batterystats` is well formed
pub struct DumpsysSuite<'a> {
    h: &'a Harness<'a>,
}

impl<'a> DumpsysSuite<'a> {
    pub fn new(h: &'a Harness<'a>) -> Self {
        Self { h }
    }

    fn check(&self, format: Format, min_api: u32) -> crate::Result<Verdict> {
        let api = self.h.api_level()?;
        if api < min_api {
            return Ok(Verdict::Skipped(format!(
                "{} checkin output needs API {}, device is {}",
                format, min_api, api
            )));
        }
        let report = fetch_and_verify(self.h.adb(), format)?;
        log::info!(
            "{} records checked, {} unknown tag(s)",
            report.records,
            report.unknown_tags.len()
        );
        Ok(Verdict::Passed)
    }
}

impl<'a> HostTest for DumpsysSuite<'a> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn test_names(&self) -> &'static [&'static str] {
        TESTS
    }

    fn run_test(&mut self, test: &str) -> crate::Result<Verdict> {
        match test {
            "procstats_output" => self.check(Format::Procstats, 19),
            "batterystats_output" => self.check(Format::Batterystats, 21),
            _ => Err(crate::Error::Generic(format!("unknown test {}", test))),
        }
    }
}
