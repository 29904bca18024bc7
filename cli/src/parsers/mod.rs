use clap::error::ErrorKind;
use std::fmt::Display;

mod apk;
pub use apk::ApkPathValueParser;

mod checkin;
pub use checkin::FormatValueParser;

pub fn simple_error(err: impl Display) -> clap::Error {
    clap::Error::raw(ErrorKind::InvalidValue, format!("{}\n", err))
}
