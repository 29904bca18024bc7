use crate::checkin::record::{parse_double, parse_int, split_drop_trailing, CheckinRecord};
use crate::checkin::StateCode;

type Check = std::result::Result<(), String>;

/// Versions a schema applies to, `min` inclusive and `max` exclusive.
///
/// A stream without a `vers` record has no version; it only matches ranges
/// without a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl VersionRange {
    pub const ANY: Self = Self {
        min: None,
        max: None,
    };

    pub const fn below(max: i64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub const fn at_least(min: i64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn contains(&self, version: Option<i64>) -> bool {
        match version {
            None => self.min.is_none(),
            Some(v) => {
                self.min.map_or(true, |min| v >= min) && self.max.map_or(true, |max| v < max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    fn check(&self, len: usize) -> Check {
        match *self {
            Self::Exactly(n) if len != n => Err(format!("expected {} fields, found {}", n, len)),
            Self::AtLeast(n) if len < n => {
                Err(format!("expected at least {} fields, found {}", n, len))
            }
            _ => Ok(()),
        }
    }
}

/// The type of a single positional field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Free text, only its presence is checked
    Text,
    Int,
    Double,
    /// Must be exactly this string
    Literal(&'static str),
    /// An integer, or this placeholder when the value is unknown
    IntOr(&'static str),
    /// `n` colon separated integers
    Ints(usize),
}

impl Field {
    fn check(&self, value: &str) -> Check {
        match *self {
            Self::Text => Ok(()),
            Self::Int => parse_int(value).map(|_| ()),
            Self::Double => parse_double(value).map(|_| ()),
            Self::Literal(expected) if value == expected => Ok(()),
            Self::Literal(expected) => {
                Err(format!("expected \"{}\" but found \"{}\"", expected, value))
            }
            Self::IntOr(placeholder) if value == placeholder => Ok(()),
            Self::IntOr(_) => parse_int(value).map(|_| ()),
            Self::Ints(n) => {
                let parts = split_drop_trailing(value, ':');
                if parts.len() != n {
                    return Err(format!(
                        "expected {} colon separated values in \"{}\"",
                        n, value
                    ));
                }
                parts.iter().try_for_each(|it| parse_int(it).map(|_| ()))
            }
        }
    }
}

/// How the fields after the positional ones are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rest {
    /// Anything goes
    Unchecked,
    /// Each field is `<state code>:<int>...` with `values` integers
    States { process: bool, values: usize },
    /// Each field is `<2 char state code>:<int>`, stopping at the first value
    /// that mentions `sysmemusage`
    Totals,
    /// The last `n` fields are integers
    TrailingInts(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    /// Field count of the whole line, including the tag and any prefix
    pub arity: Arity,
    /// Types of the fields directly after the tag
    pub fields: &'static [Field],
    pub rest: Rest,
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaEntry {
    pub tags: &'static [&'static str],
    pub versions: VersionRange,
    pub schema: Schema,
}

/// Find the schema for `tag` at `version`. Unknown tags have none.
pub fn resolve(
    table: &'static [SchemaEntry],
    tag: &str,
    version: Option<i64>,
) -> Option<&'static Schema> {
    table
        .iter()
        .find(|it| it.tags.iter().any(|t| *t == tag) && it.versions.contains(version))
        .map(|it| &it.schema)
}

/// Whether `tag` appears in `table` at any version
pub fn is_known(table: &'static [SchemaEntry], tag: &str) -> bool {
    table.iter().any(|it| it.tags.iter().any(|t| *t == tag))
}

impl Schema {
    /// Check `record` against this schema, failing with an assertion that
    /// names the record and the offending token
    pub fn check(&self, record: &CheckinRecord) -> crate::Result<()> {
        self.check_fields(record).map_err(|e| record.error(e))
    }

    fn check_fields(&self, record: &CheckinRecord) -> Check {
        let fields = record.fields();
        self.arity.check(fields.len())?;

        let first = record.tag_index() + 1;
        let rest_start = first + self.fields.len();
        if fields.len() < rest_start {
            return Err(format!(
                "expected at least {} fields, found {}",
                rest_start,
                fields.len()
            ));
        }

        for (field, value) in self.fields.iter().zip(&fields[first..rest_start]) {
            field.check(value)?;
        }

        let rest = &fields[rest_start..];
        match self.rest {
            Rest::Unchecked => Ok(()),
            Rest::States { process, values } => rest
                .iter()
                .try_for_each(|it| check_state_field(it, process, values)),
            Rest::Totals => check_totals(rest),
            Rest::TrailingInts(n) => {
                let start = fields.len().saturating_sub(n).max(rest_start);
                fields[start..]
                    .iter()
                    .try_for_each(|it| parse_int(it).map(|_| ()))
            }
        }
    }
}

fn check_state_code(code: &str, process: bool) -> Check {
    match StateCode::parse(code, process) {
        Some(_) => Ok(()),
        None => Err(format!("malformed state code \"{}\"", code)),
    }
}

fn check_state_field(value: &str, process: bool, values: usize) -> Check {
    let parts = split_drop_trailing(value, ':');
    if parts.len() != values + 1 {
        return Err(format!(
            "expected {} colon separated values in \"{}\"",
            values + 1,
            value
        ));
    }
    check_state_code(parts[0], process)?;
    parts[1..]
        .iter()
        .try_for_each(|it| parse_int(it).map(|_| ()))
}

fn check_totals(rest: &[String]) -> Check {
    for value in rest {
        let parts = split_drop_trailing(value, ':');
        if parts.len() < 2 {
            return Err(format!("expected <state>:<value> but found \"{}\"", value));
        }
        check_state_code(parts[0], false)?;
        if parts[1].contains("sysmemusage") {
            break;
        }
        parse_int(parts[1])?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    fn test_version_ranges() {
        assert!(VersionRange::ANY.contains(None));
        assert!(VersionRange::ANY.contains(Some(100)));
        assert!(VersionRange::below(4).contains(None));
        assert!(VersionRange::below(4).contains(Some(3)));
        assert!(!VersionRange::below(4).contains(Some(4)));
        assert!(!VersionRange::at_least(4).contains(None));
        assert!(VersionRange::at_least(4).contains(Some(4)));
        assert!(!VersionRange::at_least(4).contains(Some(3)));
    }

    #[rstest]
    #[case(Field::Int, "-12", true)]
    #[case(Field::Int, "1.5", false)]
    #[case(Field::Double, "1.5", true)]
    #[case(Field::Double, "abc", false)]
    #[case(Field::Literal("f"), "f", true)]
    #[case(Field::Literal("f"), "p", false)]
    #[case(Field::IntOr("N/A"), "N/A", true)]
    #[case(Field::IntOr("N/A"), "12", true)]
    #[case(Field::IntOr("N/A"), "n/a", false)]
    #[case(Field::Ints(3), "1:2:3", true)]
    #[case(Field::Ints(3), "1:2", false)]
    #[case(Field::Ints(3), "1:2:x", false)]
    fn test_field_checks(#[case] field: Field, #[case] value: &str, #[case] ok: bool) {
        assert_eq!(field.check(value).is_ok(), ok, "{:?} {}", field, value);
    }

    #[rstest]
    fn test_totals_stop_at_sysmemusage() {
        let rest: Vec<String> = vec!["0n:100".into(), "1m:sysmemusage".into(), "garbage".into()];
        assert!(check_totals(&rest).is_ok());
        let rest: Vec<String> = vec!["0n:abc".into()];
        assert!(check_totals(&rest).is_err());
        let rest: Vec<String> = vec!["0nt:1".into()];
        assert!(check_totals(&rest).is_err());
    }

    #[rstest]
    fn test_trailing_ints() {
        static SCHEMA: Schema = Schema {
            arity: Arity::AtLeast(4),
            fields: &[],
            rest: Rest::TrailingInts(2),
        };
        let record = |fields: &[&str]| {
            CheckinRecord::new(1, None, 0, fields.iter().map(|it| it.to_string()).collect())
        };
        assert!(SCHEMA.check(&record(&["wr", "a", "b", "1", "2"])).is_ok());
        assert!(SCHEMA.check(&record(&["wr", "a", "1", "x"])).is_err());
        assert!(SCHEMA.check(&record(&["wr", "1", "2"])).is_err());
    }
}
