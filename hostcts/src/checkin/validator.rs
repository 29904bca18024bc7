use std::collections::BTreeSet;

use serde::Serialize;

use crate::checkin::schema::{is_known, resolve};
use crate::checkin::{batterystats, CheckinRecord, Format};
use crate::Error;

/// Summary of a checkin dump that passed validation
#[derive(Debug, Clone, Serialize)]
pub struct CheckinReport {
    pub format: Format,
    /// Number of non-blank lines checked
    pub records: usize,
    /// The last version declared by a `vers` record
    pub version: Option<i64>,
    pub seen_tags: BTreeSet<String>,
    /// Tags that have no schema and were only counted
    pub unknown_tags: BTreeSet<String>,
}

/// Checks records one at a time and remembers which tags it has seen
pub struct Validator {
    format: Format,
    records: usize,
    version: Option<i64>,
    seen_tags: BTreeSet<String>,
    unknown_tags: BTreeSet<String>,
}

impl Validator {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            records: 0,
            version: None,
            seen_tags: BTreeSet::new(),
            unknown_tags: BTreeSet::new(),
        }
    }

    pub fn seen_tags(&self) -> &BTreeSet<String> {
        &self.seen_tags
    }

    pub fn check(&mut self, record: &CheckinRecord) -> crate::Result<()> {
        if self.format == Format::Batterystats {
            batterystats::check_prefix(record)?;
        }

        let tag = record.tag();
        self.records += 1;
        self.seen_tags.insert(tag.to_string());

        let table = self.format.schemas();
        match resolve(table, tag, record.version()) {
            Some(schema) => {
                log::trace!("line {}: checking `{}`", record.line(), tag);
                schema.check(record)?;
            }
            None if is_known(table, tag) => {
                return Err(record.error(format!(
                    "no layout for version {:?}",
                    record.version()
                )));
            }
            None => {
                if self.unknown_tags.insert(tag.to_string()) {
                    log::debug!("no schema for `{}` records, skipping them", tag);
                }
            }
        }

        if let Some(version) = self.format.declared_version(record) {
            self.version = Some(version);
        }
        Ok(())
    }

    /// Spot check that the tags every healthy dump contains were all seen
    pub fn finish(self) -> crate::Result<CheckinReport> {
        for tag in self.format.required_tags() {
            if !self.seen_tags.contains(*tag) {
                return Err(Error::Assertion(format!(
                    "no line with the `{}` tag in `{}` output",
                    tag,
                    self.format.command()
                )));
            }
        }
        Ok(CheckinReport {
            format: self.format,
            records: self.records,
            version: self.version,
            seen_tags: self.seen_tags,
            unknown_tags: self.unknown_tags,
        })
    }
}
