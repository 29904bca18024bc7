use std::io;
use std::path::Path;

use thiserror::Error;

use crate::utils::path_must_str;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("required binary `{0}` not available to context")]
    MissingBin(String),
    #[error("missing required env var: {0}")]
    MissingEnv(String),

    #[error("{0}")]
    IO(io::Error),

    #[error("command failed with status {0}: {1}")]
    CommandError(i32, String),

    #[error("no adb device connected")]
    NoAdbDevice,
    #[error("adb device {0} not found")]
    AdbDeviceNotFound(String),
    /// The adb transport failed (device offline, connection closed, ...)
    #[error("device error: {0}")]
    DeviceError(String),
    #[error("adb disabled by configuration file")]
    AdbDisabled,

    /// An expected-vs-actual mismatch in device output, this is a normal
    /// test failure.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// The device replied in a shape the harness can't make sense of at all
    /// (no session id, no `Success:` token, ...).
    #[error("harness error: {0}")]
    Harness(String),

    #[error("failed to push {0}")]
    PushFailed(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("generic error: {0}")]
    Generic(String),

    #[error("invalid config {0}: {1}")]
    InvalidConfig(String, String),

    #[error("file {0} doesn't exist")]
    MissingFile(String),
}

impl Error {
    pub fn new_generic<S: ToString + ?Sized>(s: &S) -> Self {
        Self::Generic(s.to_string())
    }

    pub fn new_cfg<S: ToString + ?Sized>(path: &Path, s: &S) -> Self {
        let as_str = path_must_str(path.as_ref());
        Self::InvalidConfig(as_str.into(), s.to_string())
    }

    /// Whether this is an ordinary test failure rather than a problem with
    /// the device or the harness itself
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::Assertion(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::IO(err)
    }
}

/// Fail with an [Error::Assertion] unless `cond` holds
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::Error::Assertion(format!($($arg)+)));
        }
    };
}
