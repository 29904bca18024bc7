use clap::builder::{NonEmptyStringValueParser, PossibleValue, TypedValueParser};
use hostcts::checkin::Format;

use crate::parsers::simple_error;

#[derive(Clone)]
pub struct FormatValueParser;

impl TypedValueParser for FormatValueParser {
    type Value = Format;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let val = NonEmptyStringValueParser::new().parse_ref(cmd, arg, value)?;
        val.parse::<Format>().map_err(simple_error)
    }

    fn possible_values(&self) -> Option<Box<dyn Iterator<Item = PossibleValue> + '_>> {
        Some(Box::new(
            ["procstats", "batterystats"].into_iter().map(PossibleValue::new),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;
    use std::ffi::OsStr;

    #[rstest]
    #[case("procstats", Some(Format::Procstats))]
    #[case("batterystats", Some(Format::Batterystats))]
    #[case("meminfo", None)]
    #[case("", None)]
    fn test_format(#[case] value: &str, #[case] expected: Option<Format>) {
        let cmd = clap::Command::new("test");
        let parsed = FormatValueParser.parse_ref(&cmd, None, OsStr::new(value)).ok();
        assert_eq!(parsed, expected);
    }
}
