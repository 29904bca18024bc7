pub mod context;
pub use context::{Context, DefaultContext};

pub mod config;

pub mod errors;
pub use errors::{Error, Result};

pub mod adb;

pub mod command;
pub use command::run_cmd;

pub mod checkin;

pub mod device;

pub mod install;
pub use install::{AbiSplits, InstallMultiple};

pub mod instrument;

pub mod monitor;

pub mod response;

pub mod suite;

pub mod users;

pub mod wait;
pub use wait::WaitPolicy;

pub mod utils;

#[cfg(test)]
pub mod testing;
