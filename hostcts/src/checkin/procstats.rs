use crate::checkin::schema::{Arity, Field, Rest, Schema, SchemaEntry, VersionRange};
use crate::checkin::{CheckinRecord, StateCode};
use crate::checkin::record::split_drop_trailing;

/// Version that added the app version column to the `pkg*` records
pub const APP_VERSION_SINCE: i64 = 4;

const PKG_SVC: &[&str] = &["pkgsvc-bound", "pkgsvc-exec", "pkgsvc-run", "pkgsvc-start"];

/// `dumpsys procstats -c` record layouts
pub static SCHEMAS: &[SchemaEntry] = &[
    SchemaEntry {
        tags: &["vers"],
        versions: VersionRange::ANY,
        schema: Schema {
            arity: Arity::Exactly(2),
            fields: &[Field::Int],
            rest: Rest::Unchecked,
        },
    },
    SchemaEntry {
        tags: &["period"],
        versions: VersionRange::ANY,
        schema: Schema {
            arity: Arity::Exactly(5),
            // date, start, end, status
            fields: &[Field::Text, Field::Int, Field::Int, Field::Text],
            rest: Rest::Unchecked,
        },
    },
    SchemaEntry {
        tags: &["pkgproc"],
        versions: VersionRange::below(APP_VERSION_SINCE),
        schema: Schema {
            arity: Arity::AtLeast(4),
            // package, uid, process
            fields: &[Field::Text, Field::Int, Field::Text],
            rest: Rest::States {
                process: true,
                values: 1,
            },
        },
    },
    SchemaEntry {
        tags: &["pkgproc"],
        versions: VersionRange::at_least(APP_VERSION_SINCE),
        schema: Schema {
            arity: Arity::AtLeast(5),
            // package, uid, app version, process
            fields: &[Field::Text, Field::Int, Field::Int, Field::Text],
            rest: Rest::States {
                process: true,
                values: 1,
            },
        },
    },
    SchemaEntry {
        tags: &["pkgpss"],
        versions: VersionRange::below(APP_VERSION_SINCE),
        schema: Schema {
            arity: Arity::AtLeast(4),
            fields: &[Field::Text, Field::Int, Field::Text],
            // sample size, pss min/avg/max, uss min/avg/max
            rest: Rest::States {
                process: true,
                values: 7,
            },
        },
    },
    SchemaEntry {
        tags: &["pkgpss"],
        versions: VersionRange::at_least(APP_VERSION_SINCE),
        schema: Schema {
            arity: Arity::AtLeast(5),
            fields: &[Field::Text, Field::Int, Field::Int, Field::Text],
            rest: Rest::States {
                process: true,
                values: 7,
            },
        },
    },
    SchemaEntry {
        tags: PKG_SVC,
        versions: VersionRange::below(APP_VERSION_SINCE),
        schema: Schema {
            arity: Arity::AtLeast(5),
            // package, uid, service, count
            fields: &[Field::Text, Field::Int, Field::Text, Field::Int],
            rest: Rest::States {
                process: false,
                values: 1,
            },
        },
    },
    SchemaEntry {
        tags: PKG_SVC,
        versions: VersionRange::at_least(APP_VERSION_SINCE),
        schema: Schema {
            arity: Arity::AtLeast(6),
            fields: &[Field::Text, Field::Int, Field::Int, Field::Text, Field::Int],
            rest: Rest::States {
                process: false,
                values: 1,
            },
        },
    },
    SchemaEntry {
        tags: &["pkgkills"],
        versions: VersionRange::below(APP_VERSION_SINCE),
        schema: Schema {
            arity: Arity::Exactly(8),
            // package, uid, process, wakes, cpu, cached, pss min:avg:max
            fields: &[
                Field::Text,
                Field::Int,
                Field::Text,
                Field::Int,
                Field::Int,
                Field::Int,
                Field::Ints(3),
            ],
            rest: Rest::Unchecked,
        },
    },
    SchemaEntry {
        tags: &["pkgkills"],
        versions: VersionRange::at_least(APP_VERSION_SINCE),
        schema: Schema {
            arity: Arity::Exactly(9),
            fields: &[
                Field::Text,
                Field::Int,
                Field::Int,
                Field::Text,
                Field::Int,
                Field::Int,
                Field::Int,
                Field::Ints(3),
            ],
            rest: Rest::Unchecked,
        },
    },
    SchemaEntry {
        tags: &["proc"],
        versions: VersionRange::ANY,
        schema: Schema {
            arity: Arity::AtLeast(3),
            fields: &[Field::Text, Field::Int],
            rest: Rest::States {
                process: true,
                values: 1,
            },
        },
    },
    SchemaEntry {
        tags: &["pss"],
        versions: VersionRange::ANY,
        schema: Schema {
            arity: Arity::AtLeast(3),
            fields: &[Field::Text, Field::Int],
            rest: Rest::States {
                process: true,
                values: 7,
            },
        },
    },
    SchemaEntry {
        tags: &["kills"],
        versions: VersionRange::ANY,
        schema: Schema {
            arity: Arity::Exactly(7),
            fields: &[
                Field::Text,
                Field::Int,
                Field::Int,
                Field::Int,
                Field::Int,
                Field::Ints(3),
            ],
            rest: Rest::Unchecked,
        },
    },
    SchemaEntry {
        tags: &["total"],
        versions: VersionRange::ANY,
        schema: Schema {
            arity: Arity::AtLeast(2),
            fields: &[],
            rest: Rest::Totals,
        },
    },
];

pub const REQUIRED_TAGS: &[&str] = &["pkgproc", "proc", "pss", "total"];

/// Process state durations from a `pkgproc` or `proc` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStates {
    pub package: String,
    pub uid: i64,
    /// Only present in `pkgproc` records at version 4 and later
    pub app_version: Option<i64>,
    /// `proc` records name the process in place of the package
    pub process: Option<String>,
    /// State and time spent in it, in milliseconds
    pub states: Vec<(StateCode, i64)>,
}

impl ProcessStates {
    pub fn from_record(record: &CheckinRecord) -> crate::Result<Self> {
        let has_app_version = record
            .version()
            .map_or(false, |it| it >= APP_VERSION_SINCE);

        let (app_version, process, states_start) = match record.tag() {
            "pkgproc" if has_app_version => (
                Some(record.int(3)?),
                Some(record.field(4)?.to_string()),
                5,
            ),
            "pkgproc" => (None, Some(record.field(3)?.to_string()), 4),
            "proc" => (None, None, 3),
            other => {
                return Err(record.error(format!(
                    "process states are only found in pkgproc and proc records, not {}",
                    other
                )))
            }
        };

        let package = record.field(1)?.to_string();
        let uid = record.int(2)?;

        let mut states = Vec::with_capacity(record.len().saturating_sub(states_start));
        for value in &record.fields()[states_start.min(record.len())..] {
            let parts = split_drop_trailing(value, ':');
            if parts.len() != 2 {
                return Err(record.error(format!("expected <state>:<duration> in \"{}\"", value)));
            }
            let code = StateCode::parse(parts[0], true)
                .ok_or_else(|| record.error(format!("malformed state code \"{}\"", parts[0])))?;
            let duration = parts[1].parse::<i64>().map_err(|_| {
                record.error(format!("expected an integer but found \"{}\"", parts[1]))
            })?;
            states.push((code, duration));
        }

        Ok(Self {
            package,
            uid,
            app_version,
            process,
            states,
        })
    }
}
