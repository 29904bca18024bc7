use blanket::blanket;
use once_cell::sync::OnceCell;
use std::env;
use std::path::PathBuf;

use directories::BaseDirs;
use which::{which, which_in};

use crate::adb::{Adb, ExecAdb};
use crate::config::{Config, HarnessConfig};
use crate::Error;

use crossbeam::atomic::AtomicCell;

use std::ops::DerefMut;
use std::sync::Mutex;

#[derive(Clone)]
struct CachedBin {
    name: String,
    path: String,
}

fn wrapped_which(bin: &str) -> Option<PathBuf> {
    if let Ok(tools_path) = env::var("HOSTCTS_PATH") {
        let cwd = env::current_dir().ok()?;
        return which_in(bin, Some(&tools_path), &cwd).ok();
    }
    which(bin).ok()
}

fn find_program(prog: &str) -> Option<String> {
    wrapped_which(prog).map(|it| it.to_string_lossy().into())
}

/// Context is a trait for an object that can help standardize file locations,
/// find binaries, and lookup env vars.
///
/// Most methods on this trait have a default implementation that is perfectly
/// safe to leave unchanged.
#[blanket(derive(Ref, Box))]
pub trait Context: Send + Sync {
    /// Returns the API level of the device under test.
    fn get_target_api_level(&self) -> crate::Result<u32>;

    fn maybe_get_env(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn maybe_get_bin(&self, bin: &str) -> Option<String> {
        find_program(bin)
    }

    fn has_bin(&self, bin: &str) -> bool {
        self.maybe_get_bin(bin).is_some()
    }

    fn get_bin(&self, bin: &str) -> crate::Result<String> {
        self.maybe_get_bin(bin)
            .ok_or_else(|| Error::MissingBin(bin.into()))
    }

    fn has_env(&self, key: &str) -> bool {
        self.maybe_get_env(key).is_some()
    }

    fn get_env(&self, key: &str) -> crate::Result<String> {
        self.maybe_get_env(key)
            .ok_or_else(|| Error::MissingEnv(key.into()))
    }

    fn get_project_dir(&self) -> crate::Result<PathBuf> {
        let home = self
            .get_env("HOSTCTS_PROJECT_HOME")
            .map(|env| PathBuf::new().join(env))?;
        if !home.exists() {
            return Err(Error::Generic(format!(
                "HOSTCTS_PROJECT_HOME set to {}, but that directory doesn't exist",
                home.to_string_lossy()
            )));
        }
        Ok(home)
    }

    fn get_project_config_file(&self) -> crate::Result<PathBuf> {
        self.get_project_dir_child("hostcts.toml")
    }

    fn get_project_config<'a>(&'a self) -> crate::Result<Option<&'a Config>>;

    /// The harness settings from the project config, or the defaults when
    /// there is no project config
    fn get_harness_config(&self) -> crate::Result<HarnessConfig> {
        match self.get_project_config()? {
            Some(cfg) => cfg.harness(),
            None => Ok(HarnessConfig::default()),
        }
    }

    fn get_project_dir_child(&self, child: &str) -> crate::Result<PathBuf> {
        self.get_project_dir().map(|x| x.join(child))
    }

    fn get_output_dir(&self) -> crate::Result<PathBuf> {
        match self.get_project_dir_child("hostcts_out") {
            Ok(v) => Ok(v),
            Err(Error::MissingEnv(_)) => self.get_user_local_dir(),
            Err(e) => Err(e),
        }
    }

    fn get_output_dir_child(&self, child: &str) -> crate::Result<PathBuf> {
        self.get_output_dir().map(|x| x.join(child))
    }

    /// Where test APKs are looked up. `apk-dir` from the harness config wins,
    /// relative values are resolved against the project directory.
    fn get_apk_dir(&self) -> crate::Result<PathBuf> {
        match self.get_harness_config()?.apk_dir {
            Some(dir) if dir.is_absolute() => Ok(dir),
            Some(dir) => self.get_project_dir().map(|p| p.join(dir)),
            None => self.get_project_dir_child("testcases"),
        }
    }

    fn get_user_local_dir(&self) -> crate::Result<PathBuf> {
        let bd = BaseDirs::new()
            .ok_or_else(|| Error::new_generic("failed to determine user directories"))?;
        Ok(bd.data_local_dir().join("hostcts"))
    }
}

pub struct DefaultContext {
    target_api_level: AtomicCell<Option<u32>>,
    bin_cache: Mutex<Vec<CachedBin>>,
    project_config: OnceCell<Option<Config>>,
}

impl Clone for DefaultContext {
    fn clone(&self) -> Self {
        let target_api_level = self.target_api_level.load();
        let cache = match self.bin_cache.lock() {
            Ok(v) => v.clone(),
            Err(_) => Vec::new(),
        };
        Self {
            target_api_level: AtomicCell::new(target_api_level),
            bin_cache: Mutex::new(cache),
            project_config: self.project_config.clone(),
        }
    }
}

impl DefaultContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_target_api_level(&mut self, target_api_level: u32) -> &mut Self {
        self.target_api_level = AtomicCell::new(Some(target_api_level));
        self
    }
}

impl Default for DefaultContext {
    fn default() -> Self {
        Self {
            target_api_level: AtomicCell::new(None),
            bin_cache: Mutex::new(Vec::new()),
            project_config: OnceCell::new(),
        }
    }
}

impl Context for DefaultContext {
    fn get_project_config<'a>(&'a self) -> crate::Result<Option<&'a Config>> {
        let cfg = self
            .project_config
            .get_or_try_init(|| -> crate::Result<Option<Config>> {
                let path = match self.get_project_config_file() {
                    Ok(v) => v,
                    // No project at all is the same as no config
                    Err(Error::MissingEnv(_)) => return Ok(None),
                    Err(e) => return Err(e),
                };
                if !path.exists() {
                    Ok(None)
                } else {
                    Ok(Some(Config::parse(&path)?))
                }
            })?;
        Ok(cfg.as_ref())
    }

    fn get_target_api_level(&self) -> crate::Result<u32> {
        if let Some(lvl) = self.target_api_level.load() {
            return Ok(lvl);
        }
        let lvl = match self.maybe_get_env(API_LEVEL_ENV) {
            Some(value) => parse_api_level_override(&value)?,
            None => query_api_level(&ExecAdb::new(self)?)?,
        };
        self.target_api_level.store(Some(lvl));
        Ok(lvl)
    }

    fn maybe_get_bin(&self, prog: &str) -> Option<String> {
        let mut cache_guard = self.bin_cache.lock().ok()?;
        let cache = cache_guard.deref_mut();
        if let Some(val) = cache.iter().find(|it| it.name == prog) {
            return Some(val.path.clone());
        }

        let found = find_program(prog)?;

        cache.push(CachedBin {
            name: prog.into(),
            path: found.clone(),
        });

        Some(found)
    }
}

const API_LEVEL_ENV: &str = "HOSTCTS_ANDROID_API_LEVEL";

fn parse_api_level_override(value: &str) -> crate::Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::Generic(format!("invalid {} `{}`", API_LEVEL_ENV, value)))
}

/// Ask the device for its API level. Any failure is a device error, there is
/// no fallback level.
pub fn query_api_level(adb: &dyn Adb) -> crate::Result<u32> {
    crate::device::get_api_level(adb)
        .map_err(|e| Error::DeviceError(format!("failed to determine API level: {}", e)))
}
