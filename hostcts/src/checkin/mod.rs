use std::fmt::{self, Display};
use std::str::FromStr;

use serde::Serialize;

use crate::adb::Adb;

pub mod batterystats;
pub mod procstats;
pub mod record;
pub mod schema;
pub mod state_code;
pub mod validator;

pub use procstats::ProcessStates;
pub use record::{CheckinRecord, Records};
pub use schema::SchemaEntry;
pub use state_code::StateCode;
pub use validator::{CheckinReport, Validator};

/// The two checkin dump formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `dumpsys procstats -c`
    Procstats,
    /// `dumpsys batterystats --checkin`
    Batterystats,
}

impl Format {
    pub fn command(&self) -> &'static str {
        match self {
            Self::Procstats => "dumpsys procstats -c",
            Self::Batterystats => "dumpsys batterystats --checkin",
        }
    }

    /// Position of the tag in a split line
    pub fn tag_index(&self) -> usize {
        match self {
            Self::Procstats => 0,
            Self::Batterystats => batterystats::PREFIX_LEN,
        }
    }

    pub fn schemas(&self) -> &'static [SchemaEntry] {
        match self {
            Self::Procstats => procstats::SCHEMAS,
            Self::Batterystats => batterystats::SCHEMAS,
        }
    }

    /// Tags every healthy dump contains
    pub fn required_tags(&self) -> &'static [&'static str] {
        match self {
            Self::Procstats => procstats::REQUIRED_TAGS,
            Self::Batterystats => batterystats::REQUIRED_TAGS,
        }
    }

    /// Split a line into fields. Procstats keeps a trailing empty column,
    /// batterystats drops trailing empty columns.
    pub fn split_line(&self, line: &str) -> Vec<String> {
        match self {
            Self::Procstats => record::split_keep_trailing(line, ','),
            Self::Batterystats => record::split_drop_trailing(line, ',')
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// The version a `vers` record declares, if `record` is one
    pub fn declared_version(&self, record: &CheckinRecord) -> Option<i64> {
        if record.tag() != "vers" {
            return None;
        }
        match self {
            Self::Procstats if record.len() == 2 => record.int(1).ok(),
            Self::Batterystats => record.int(self.tag_index() + 1).ok(),
            _ => None,
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Procstats => write!(f, "procstats"),
            Self::Batterystats => write!(f, "batterystats"),
        }
    }
}

impl FromStr for Format {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "procstats" => Ok(Self::Procstats),
            "batterystats" => Ok(Self::Batterystats),
            _ => Err(crate::Error::Generic(format!("unknown checkin format: {}", s))),
        }
    }
}

/// Validate a complete checkin dump.
///
/// Every line is checked against the layout for its tag at the version in
/// effect, stopping at the first bad record, and the spot check tags must all
/// be present.
pub fn verify(format: Format, text: &str) -> crate::Result<CheckinReport> {
    let mut validator = Validator::new(format);
    for record in Records::new(format, text)? {
        validator.check(&record?)?;
    }
    validator.finish()
}

/// Run the dump command for `format` on the device and validate its output
pub fn fetch_and_verify(adb: &dyn Adb, format: Format) -> crate::Result<CheckinReport> {
    let text = adb.shell_text(format.command())?;
    log::debug!("`{}` returned {} bytes", format.command(), text.len());
    verify(format, &text)
}
