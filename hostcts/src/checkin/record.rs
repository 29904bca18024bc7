use std::fmt::Display;
use std::str::Lines;

use crate::checkin::Format;
use crate::Error;

/// One non-blank line of checkin output, split into fields.
///
/// `version` is the schema version declared by the last `vers` record seen
/// before this line, `None` if there wasn't one yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinRecord {
    line: usize,
    version: Option<i64>,
    tag_index: usize,
    fields: Vec<String>,
}

impl CheckinRecord {
    pub fn new(line: usize, version: Option<i64>, tag_index: usize, fields: Vec<String>) -> Self {
        Self {
            line,
            version,
            tag_index,
            fields,
        }
    }

    /// 1-based line number in the original text
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn version(&self) -> Option<i64> {
        self.version
    }

    pub fn tag(&self) -> &str {
        self.fields
            .get(self.tag_index)
            .map(|it| it.as_str())
            .unwrap_or_default()
    }

    /// Index of the tag field, fields after it are the tag's payload
    pub fn tag_index(&self) -> usize {
        self.tag_index
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Total number of fields, including the tag and any prefix
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> crate::Result<&str> {
        self.fields
            .get(idx)
            .map(|it| it.as_str())
            .ok_or_else(|| self.error(format!("missing field {}", idx)))
    }

    pub fn int(&self, idx: usize) -> crate::Result<i64> {
        let value = self.field(idx)?;
        parse_int(value).map_err(|e| self.error(e))
    }

    pub fn double(&self, idx: usize) -> crate::Result<f64> {
        let value = self.field(idx)?;
        parse_double(value).map_err(|e| self.error(e))
    }

    /// Build an assertion error that names this record's tag and line
    pub fn error<M: Display>(&self, msg: M) -> Error {
        Error::Assertion(format!(
            "`{}` record on line {}: {}",
            self.tag(),
            self.line,
            msg
        ))
    }
}

pub(crate) fn parse_int(value: &str) -> Result<i64, String> {
    value
        .parse::<i64>()
        .map_err(|_| format!("expected an integer but found \"{}\"", value))
}

pub(crate) fn parse_double(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("expected a double but found \"{}\"", value)),
    }
}

/// Split on `sep` keeping every field, including trailing empty ones
pub fn split_keep_trailing(line: &str, sep: char) -> Vec<String> {
    line.split(sep).map(String::from).collect()
}

/// Split on `sep` and drop trailing empty fields
pub fn split_drop_trailing(line: &str, sep: char) -> Vec<&str> {
    let mut parts: Vec<&str> = line.split(sep).collect();
    while parts.last().map_or(false, |it| it.is_empty()) {
        parts.pop();
    }
    parts
}

/// Iterator over the records of a checkin dump, carrying the schema version
/// from each `vers` record to the records that follow it.
pub struct Records<'a> {
    format: Format,
    lines: Lines<'a>,
    line_no: usize,
    version: Option<i64>,
}

impl<'a> Records<'a> {
    /// Fails if `text` holds nothing but whitespace
    pub fn new(format: Format, text: &'a str) -> crate::Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::Assertion(format!(
                "`{}` produced no output",
                format.command()
            )));
        }
        Ok(Self {
            format,
            lines: text.lines(),
            line_no: 0,
            version: None,
        })
    }

    pub fn version(&self) -> Option<i64> {
        self.version
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = crate::Result<CheckinRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let fields = self.format.split_line(line);
            let tag_index = self.format.tag_index();
            if fields.len() <= tag_index {
                return Some(Err(Error::Assertion(format!(
                    "line {} has no tag: {}",
                    self.line_no, line
                ))));
            }
            let record = CheckinRecord::new(self.line_no, self.version, tag_index, fields);
            if let Some(version) = self.format.declared_version(&record) {
                log::trace!("checkin version {} at line {}", version, self.line_no);
                self.version = Some(version);
            }
            return Some(Ok(record));
        }
    }
}
