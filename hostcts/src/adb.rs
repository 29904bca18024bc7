use std::io;

use lazy_static::lazy_static;
use log;
use regex::Regex;

use crate::command::{run_cmd, CmdOutput};
use crate::config::{AdbConfig, DeviceConfig};
use crate::Context;

lazy_static! {
    static ref DEVICE_NOT_FOUND: Regex = Regex::new(r"device\s+'([^']+)'\s+not\s+found").unwrap();
}

/// The Adb trait abstracts the handful of `adb` commands the harness needs.
///
/// Every device interaction goes through this trait so that the sequencing
/// logic can be driven against a mock in tests.
pub trait Adb: Send + Sync {
    fn get_connected_devices(&self) -> crate::Result<Vec<String>>;

    /// Install the APK at the given path, replacing any existing install
    fn install(&self, apk: &str) -> crate::Result<()>;

    /// Uninstall the given package
    fn uninstall(&self, package: &str) -> crate::Result<()>;

    /// Essentially the same as running `adb pull $device $local`
    fn pull(&self, device: &str, local: &str) -> io::Result<CmdOutput>;

    /// Essentially the same as running `adb push $local $device`
    fn push(&self, local: &str, device: &str) -> io::Result<CmdOutput>;

    /// Essentially the same as running `adb shell '...'`
    fn shell(&self, shell_cmd: &str) -> io::Result<CmdOutput>;

    /// Run a shell command and return everything it printed.
    ///
    /// The commands the harness drives report their outcome in text, so a
    /// non-zero exit status alone isn't an error and stderr is appended to
    /// stdout. Failures of the transport itself (`error: ...` from the adb
    /// client, or a failed command that printed nothing) are returned as
    /// errors instead.
    fn shell_text(&self, shell_cmd: &str) -> crate::Result<String> {
        let out = self.shell(shell_cmd)?;
        let stderr = out.stderr_utf8_lossy();
        if let Some(err) = adb_error_from_stderr(&stderr) {
            return Err(err);
        }
        if !out.ok() && out.stdout.is_empty() && stderr.trim().is_empty() {
            return Err(crate::Error::CommandError(
                out.status.code().unwrap_or(-1),
                format!("`{}` failed without output", shell_cmd),
            ));
        }
        let mut text = out.stdout_utf8_lossy().into_owned();
        if !stderr.is_empty() {
            text.push_str(&stderr);
        }
        Ok(text)
    }
}

/// Recognize errors reported by the `adb` client rather than the device
pub fn adb_error_from_stderr(stderr: &str) -> Option<crate::Error> {
    if stderr.contains("no devices/emulators") {
        return Some(crate::Error::NoAdbDevice);
    }
    if let Some(caps) = DEVICE_NOT_FOUND.captures(stderr) {
        let serial = caps
            .get(1)
            .map(|m| String::from(m.as_str()))
            .unwrap_or_else(|| "?".into());
        log::debug!("adb bin stderr: {}", stderr);
        return Some(crate::Error::AdbDeviceNotFound(serial));
    }
    let line = stderr
        .lines()
        .map(str::trim)
        .find(|it| it.starts_with("error:") || it.starts_with("adb: error:"))?;
    log::debug!("adb bin stderr: {}", stderr);
    Some(crate::Error::DeviceError(line.into()))
}

#[derive(Clone)]
/// An `Adb` implementation that just invokes the external `adb` command.
pub struct ExecAdb {
    bin: String,
    serial: Option<String>,
}

impl ExecAdb {
    /// Creates a new `ExecAdb` from the given context.
    ///
    /// This will first check the project config file for the device section:
    ///
    /// [device]
    /// adb = { serial = "...", executable = "..." }
    ///
    /// and use that if found. Otherwise defaults are pulled from the
    /// environment. If `can-adb = false` is set in the config, this function
    /// will fail.
    pub fn new(ctx: &dyn Context) -> crate::Result<Self> {
        match ctx.get_project_config() {
            Ok(Some(cfg)) => Self::try_from_device_config(ctx, &cfg.device()?),
            _ => Self::from_env(ctx),
        }
    }

    pub fn from_env(ctx: &dyn Context) -> crate::Result<Self> {
        let bin = ctx.get_bin("adb")?;
        let serial = ctx.maybe_get_env("ANDROID_SERIAL");

        Ok(Self { bin, serial })
    }

    pub fn has_serial(&self) -> bool {
        self.serial.is_some()
    }

    fn try_from_device_config(ctx: &dyn Context, cfg: &DeviceConfig) -> crate::Result<Self> {
        if !cfg.can_adb {
            return Err(crate::Error::AdbDisabled);
        }
        match &cfg.adb {
            Some(adb) => Self::try_from_adb_config(ctx, adb),
            None => Self::from_env(ctx),
        }
    }

    pub fn try_from_adb_config(ctx: &dyn Context, cfg: &AdbConfig) -> crate::Result<Self> {
        let bin = cfg.get_executable(ctx)?.into_owned();
        let serial = cfg.get_serial(ctx).map(|it| it.into_owned());
        Ok(Self { bin, serial })
    }
}

macro_rules! adb_cmd {
    ($adb:ident, $cmd:literal, $($args:expr),*) => {
        if let Some(ref serial) = $adb.serial {
            run_cmd(&$adb.bin, &["-s", serial, $cmd, $($args),*])
        } else {
            run_cmd(&$adb.bin, &[$cmd, $($args),*])
        }
    }
}

fn empty_result(res: io::Result<CmdOutput>) -> crate::Result<()> {
    let out = res?;
    if let Some(err) = adb_error_from_stderr(&out.stderr_utf8_lossy()) {
        return Err(err);
    }
    out.err_on_status().map(|_| ())
}

impl Adb for ExecAdb {
    /// Returns a list of all connected devices (similar to `adb devices -l`)
    fn get_connected_devices(&self) -> crate::Result<Vec<String>> {
        let output = run_cmd(&self.bin, &["devices", "-l"])?;
        let mut device_list = Vec::new();
        let out_str = output.stdout_utf8_lossy();
        let mut split = out_str.split('\n');
        // Skip the "List of devices attached" header
        if split.next().is_none() {
            return Err(crate::Error::NoAdbDevice);
        }

        for l in split {
            if l.is_empty() || !l.contains("device") {
                continue;
            }
            if let Some(id) = l.split_ascii_whitespace().next() {
                device_list.push(id.into());
            }
        }

        if device_list.is_empty() {
            return Err(crate::Error::NoAdbDevice);
        }

        Ok(device_list)
    }

    fn install(&self, apk: &str) -> crate::Result<()> {
        empty_result(adb_cmd!(self, "install", "-r", apk))
    }

    fn uninstall(&self, package: &str) -> crate::Result<()> {
        empty_result(adb_cmd!(self, "uninstall", package))
    }

    fn pull(&self, device: &str, local: &str) -> io::Result<CmdOutput> {
        adb_cmd!(self, "pull", device, local)
    }

    fn push(&self, local: &str, device: &str) -> io::Result<CmdOutput> {
        adb_cmd!(self, "push", local, device)
    }

    fn shell(&self, shell_cmd: &str) -> io::Result<CmdOutput> {
        adb_cmd!(self, "shell", shell_cmd)
    }
}
