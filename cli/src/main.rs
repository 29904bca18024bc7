use std::borrow::Cow;
use std::path::PathBuf;

use anyhow::Context as AnyhowContext;
use clap::{Parser, Subcommand};
use flexi_logger::{FileSpec, LevelFilter, LogSpecification, Logger, LoggerHandle, WriteMode};

use hostcts::{Context, DefaultContext};

mod parsers;
mod printer;
mod utils;

mod check;
use check::RunCheck;

mod checkin;
use checkin::Checkin;

mod install;
use install::Install;

mod instrument;
use instrument::Instrument;

mod run;
use run::{ListSuites, Run};

mod user;
use user::User;

const SIMPLE_VERSION_STRING: &'static str =
    include!(concat!(env!("OUT_DIR"), "/simple_version_string"));
const VERSION_STRING: &'static str = include!(concat!(env!("OUT_DIR"), "/version_string"));

#[derive(Parser)]
#[command(name = "hostcts")]
#[command(version(SIMPLE_VERSION_STRING))]
#[command(long_version(VERSION_STRING))]
struct Cli {
    /// `-e`, `--log-stderr`: Log to `stderr` instead of the log file
    #[arg(short = 'e', long, help = "Log to stderr instead of a file", action = clap::ArgAction::SetTrue, default_value_t = false)]
    log_stderr: bool,

    /// `-f`, `--log-file`: Path to the log file. Defaults to
    /// `$HOSTCTS_PROJECT_HOME/hostcts_out/log`
    #[arg(short = 'f', long, help = "Send log output to the given file")]
    log_file: Option<PathBuf>,

    /// `-s`, `--log-spec`: A [flexi_logger](https://docs.rs/flexi_logger/latest/flexi_logger/struct.LogSpecification.html) log spec
    #[arg(short = 's', long, help = "Log spec for flexi_logger")]
    log_spec: Option<String>,

    /// `-l`, `--log-level`: Log verbosity for the harness:
    ///
    /// | Value | Log Level |
    /// | ----- | --------- |
    /// | **0** | **Warn** |
    /// | 1 | Info |
    /// | 2 | Debug |
    /// | 3 | Trace |
    #[arg(
        short = 'l',
        long,
        help = "Set the log level, 0 = warn, 1 = info, etc",
        long_help = None,
        default_value_t = 0
    )]
    log_level: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the full version string and exit
    #[command()]
    Version,

    /// Check that the tools and environment the harness needs are present
    #[command()]
    RunCheck(RunCheck),

    /// Run host test suites against the device
    #[command()]
    Run(Run),

    /// List the available suites
    #[command(alias = "ls")]
    ListSuites(ListSuites),

    /// Validate a `dumpsys` checkin dump
    ///
    /// The dump is taken from the device unless `--file` is given.
    #[command()]
    Checkin(Checkin),

    /// Install APKs through a single package manager session
    #[command()]
    Install(Install),

    /// Manage device users and profiles
    #[command()]
    User(User),

    /// Run device side tests with `am instrument`
    #[command()]
    Instrument(Instrument),
}

impl Cli {
    fn configure_loggers(&self, ctx: &DefaultContext) -> anyhow::Result<LoggerHandle> {
        let log_spec = match &self.log_spec {
            Some(s) => {
                LogSpecification::parse(s).with_context(|| format!("parsing log spec {}", s))?
            }
            None => {
                if self.log_level > 0 {
                    let lvl = if self.log_level == 1 {
                        LevelFilter::Info
                    } else if self.log_level == 2 {
                        LevelFilter::Debug
                    } else {
                        LevelFilter::Trace
                    };
                    LogSpecification::builder().module("hostcts", lvl).build()
                } else {
                    LogSpecification::env().with_context(|| "getting log spec from env")?
                }
            }
        };

        let mut logger = Logger::with(log_spec);

        if !self.log_stderr {
            let path = match &self.log_file {
                Some(v) => {
                    if v.is_absolute() {
                        Some(Cow::Borrowed(v))
                    } else {
                        let full_path = std::env::current_dir()?.join(v);
                        Some(Cow::Owned(full_path))
                    }
                }
                None => ctx.get_output_dir_child("log").map(Cow::Owned).ok(),
            };

            if let Some(p) = &path {
                logger = logger
                    .log_to_file(
                        FileSpec::try_from(p.as_ref()).with_context(|| "creating filespec")?,
                    )
                    .append()
                    .write_mode(WriteMode::BufferAndFlush);
            }
        }

        Ok(logger.start().with_context(|| "starting logger")?)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = &cli.command {
        println!("{}", VERSION_STRING);
        return Ok(());
    }

    let ctx = DefaultContext::default();

    let log_handle = cli.configure_loggers(&ctx)?;

    let res = match cli.command {
        Commands::RunCheck(c) => c.run(&ctx),
        Commands::Run(c) => c.run(),
        Commands::ListSuites(c) => c.run(),
        Commands::Checkin(c) => c.run(),
        Commands::Install(c) => c.run(),
        Commands::User(c) => c.run(),
        Commands::Instrument(c) => c.run(),

        Commands::Version => unreachable!(),
    };

    log_handle.flush();
    res
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;
    use rstest::*;

    #[rstest]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["hostcts", "run", "splits", "--test", "native_all"], true)]
    #[case(&["hostcts", "run", "--skip-preconditions", "trusted-voice"], true)]
    #[case(&["hostcts", "-l", "2", "ls", "--tests"], true)]
    #[case(&["hostcts", "checkin", "procstats", "--json"], true)]
    #[case(&["hostcts", "checkin", "meminfo"], false)]
    #[case(&["hostcts", "user", "remove", "--all"], true)]
    #[case(&["hostcts", "user", "remove"], false)]
    #[case(&["hostcts", "instrument", "--method", "testFoo", "com.example"], false)]
    #[case(&["hostcts", "instrument", "-c", ".FooTest", "-u", "10", "com.example"], true)]
    fn test_parse_args(#[case] args: &[&str], #[case] ok: bool) {
        assert_eq!(Cli::try_parse_from(args).is_ok(), ok);
    }
}
