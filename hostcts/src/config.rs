use std::fmt::Display;
use std::path::Path;
use std::time::Duration;
use std::{borrow::Cow, path::PathBuf};
use toml::{Table, Value};

use crate::install::AbiSplits;
use crate::instrument::DEFAULT_RUNNER;
use crate::utils::{path_must_str, read_file};
use crate::wait::WaitPolicy;
use crate::Context;

#[derive(Debug)]
pub enum Error {
    InvalidType,
    MissingKey,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::InvalidType => "InvalidType",
                Self::MissingKey => "MissingKey",
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub struct ConfigMap<'c> {
    path: &'c Path,
    name: Option<Cow<'c, str>>,
    table: &'c Table,
}

/// The parsed `hostcts.toml` project file
#[derive(Clone)]
pub struct Config {
    path: PathBuf,
    base: Table,
}

/// How to reach the device
#[derive(Clone, Debug, Default)]
pub struct AdbConfig {
    pub serial: Option<String>,
    pub executable: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub can_adb: bool,
    pub adb: Option<AdbConfig>,
}

/// Settings for the harness itself
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// Directory holding the test APKs, relative paths are taken relative to
    /// the project directory
    pub apk_dir: Option<PathBuf>,
    /// ABI to force when installing, `None` means ask the device
    pub abi: Option<String>,
    pub instrumentation_runner: String,
    pub wait: WaitPolicy,
    pub abi_splits: AbiSplits,
    /// Don't run the device side precondition checks before the suites
    pub skip_preconditions: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            apk_dir: None,
            abi: None,
            instrumentation_runner: DEFAULT_RUNNER.into(),
            wait: WaitPolicy::default(),
            abi_splits: AbiSplits::default(),
            skip_preconditions: false,
        }
    }
}

impl AdbConfig {
    pub fn get_executable<'a>(&'a self, ctx: &dyn Context) -> crate::Result<Cow<'a, str>> {
        match &self.executable {
            Some(v) => Ok(Cow::Borrowed(v.as_str())),
            None => ctx.get_bin("adb").map(Cow::Owned),
        }
    }

    pub fn get_serial<'a>(&'a self, ctx: &dyn Context) -> Option<Cow<'a, str>> {
        match &self.serial {
            Some(v) => Some(Cow::Borrowed(v.as_str())),
            None => ctx.maybe_get_env("ANDROID_SERIAL").map(Cow::Owned),
        }
    }
}

impl Config {
    pub fn parse(source: &Path) -> crate::Result<Self> {
        let as_str = read_file(source)?;

        let path = PathBuf::from(source);

        let base: Table = match toml::from_str(&as_str) {
            Ok(v) => v,
            Err(e) => return Err(crate::Error::new_cfg(source, &e)),
        };
        Ok(Self { base, path })
    }

    pub fn get_map(&self) -> ConfigMap {
        ConfigMap {
            name: None,
            path: &self.path,
            table: &self.base,
        }
    }

    /// Read the `[device]` section and the top level `can-adb` flag
    pub fn device(&self) -> crate::Result<DeviceConfig> {
        let base = self.get_map();
        let can_adb = base.get_bool_or("can-adb", true);
        let adb = match base.maybe_get_map_typecheck("device")? {
            None => None,
            Some(device) => match device.maybe_get_map_typecheck("adb")? {
                None => None,
                Some(adb) => Some(AdbConfig {
                    serial: adb.maybe_get_str_typecheck("serial")?.map(String::from),
                    executable: adb.maybe_get_str_typecheck("executable")?.map(String::from),
                }),
            },
        };
        Ok(DeviceConfig { can_adb, adb })
    }

    /// Read the `[harness]` and `[abi-splits]` sections, falling back to
    /// defaults for anything missing
    pub fn harness(&self) -> crate::Result<HarnessConfig> {
        let base = self.get_map();
        let mut cfg = HarnessConfig::default();

        if let Some(harness) = base.maybe_get_map_typecheck("harness")? {
            cfg.apk_dir = harness.maybe_get_str_typecheck("apk-dir")?.map(PathBuf::from);
            cfg.abi = harness.maybe_get_str_typecheck("abi")?.map(String::from);
            if let Some(runner) = harness.maybe_get_str_typecheck("instrumentation-runner")? {
                cfg.instrumentation_runner = runner.into();
            }
            cfg.skip_preconditions = harness.get_bool_or("skip-preconditions", false);
            if let Some(wait) = harness.maybe_get_map_typecheck("wait")? {
                cfg.wait = wait_policy_from_map(&wait)?;
            }
        }

        if let Some(splits) = base.maybe_get_map_typecheck("abi-splits")? {
            let mut entries = Vec::new();
            for key in splits.keys() {
                let apk = splits.must_get_str(key)?;
                entries.push((key.to_string(), apk.to_string()));
            }
            cfg.abi_splits = AbiSplits::new(entries);
        }

        Ok(cfg)
    }
}

fn wait_policy_from_map(map: &ConfigMap) -> crate::Result<WaitPolicy> {
    let mut policy = WaitPolicy::default();
    if let Some(secs) = map.maybe_get_int_typecheck("timeout-secs")? {
        policy.timeout = Duration::from_secs(non_negative(map, "timeout-secs", secs)?);
    }
    if let Some(ms) = map.maybe_get_int_typecheck("initial-interval-ms")? {
        policy.initial_interval =
            Duration::from_millis(non_negative(map, "initial-interval-ms", ms)?);
    }
    if let Some(ms) = map.maybe_get_int_typecheck("max-interval-ms")? {
        policy.max_interval = Duration::from_millis(non_negative(map, "max-interval-ms", ms)?);
    }
    Ok(policy)
}

fn non_negative(map: &ConfigMap, key: &str, value: i64) -> crate::Result<u64> {
    u64::try_from(value).map_err(|_| map.invalid_key(key, "non-negative int"))
}

impl<'c> ConfigMap<'c> {
    fn get_full_path<'a>(&'a self) -> Option<&'a str> {
        self.name.as_ref().map(|it| it.as_ref())
    }

    fn key_path<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match self.get_full_path() {
            None => Cow::Borrowed(key),
            Some(v) => Cow::Owned(format!("{}.{}", v, key)),
        }
    }

    /// Helper to create a crate::Error for a missing key
    pub fn missing_key(&self, key: &str) -> crate::Error {
        let path = self.key_path(key);
        crate::Error::InvalidConfig(
            path_must_str(self.path).into(),
            format!("missing key: {}", path),
        )
    }

    /// Helper to create a crate::Error for an invalid key
    pub fn invalid_key(&self, key: &str, expected: &str) -> crate::Error {
        let path = self.key_path(key);
        crate::Error::InvalidConfig(
            path_must_str(self.path).into(),
            format!(
                "invalid value for key: {} (expected type: {})",
                path, expected
            ),
        )
    }

    pub fn keys(&self) -> impl Iterator<Item = &'c str> {
        self.table.keys().map(|it| it.as_str())
    }

    fn get(&self, key: &str) -> Option<&'c Value> {
        self.table.get(key)
    }

    pub fn maybe_get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            Some(v) => match v.as_integer() {
                Some(v) => Ok(Some(v)),
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn maybe_get_int_typecheck(&self, key: &str) -> crate::Result<Option<i64>> {
        self.maybe_get_int(key)
            .map_err(|_| self.invalid_key(key, "int"))
    }

    pub fn get_str(&self, key: &str) -> Result<&'c str> {
        self.maybe_get_str(key)?.ok_or(Error::MissingKey)
    }

    pub fn maybe_get_str(&self, key: &str) -> Result<Option<&'c str>> {
        match self.get(key) {
            Some(v) => match v.as_str() {
                Some(v) => Ok(Some(v)),
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn maybe_get_str_typecheck(&self, key: &str) -> crate::Result<Option<&'c str>> {
        self.maybe_get_str(key)
            .map_err(|_| self.invalid_key(key, "string"))
    }

    pub fn must_get_str(&self, key: &str) -> crate::Result<&'c str> {
        match self.get_str(key) {
            Err(Error::InvalidType) => Err(self.invalid_key(key, "string")),
            Err(Error::MissingKey) => Err(self.missing_key(key)),
            Ok(v) => Ok(v),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.table
            .get(key)
            .map(|it| it.as_bool().unwrap_or(default))
            .unwrap_or(default)
    }

    pub fn maybe_get_map(&self, key: &str) -> Result<Option<ConfigMap<'c>>> {
        match self.get(key) {
            Some(v) => match v.as_table() {
                Some(table) => {
                    let name = match &self.get_full_path() {
                        Some(parents) => format!("{parents}.{key}"),
                        None => key.to_string(),
                    };
                    Ok(Some(Self {
                        name: Some(Cow::Owned(name)),
                        path: self.path,
                        table,
                    }))
                }
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn get_map(&self, key: &str) -> Result<ConfigMap<'c>> {
        self.maybe_get_map(key)?.ok_or(Error::MissingKey)
    }

    pub fn maybe_get_map_typecheck(&self, key: &str) -> crate::Result<Option<ConfigMap<'c>>> {
        self.maybe_get_map(key)
            .map_err(|_| self.invalid_key(key, "table"))
    }
}
