#![allow(unused)]
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::Context as AnyhowContext;
use rand::Rng;
use rstest::fixture;

use crate::config::Config;
use crate::utils::{ensure_dir_exists, path_must_str};
use crate::Context;

#[fixture]
pub fn tmp_context() -> TestContext {
    TestContext::default()
}

#[fixture]
#[once]
pub fn global_tmp_context() -> TestContext {
    TestContext::default()
}

pub struct TestContext {
    base_dir: PathBuf,
    env: HashMap<String, String>,
    bins: HashMap<String, String>,
    api_level: u32,
}

impl TestContext {
    pub const API_LEVEL: u32 = 33;

    pub fn set_env<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) -> &mut Self {
        self.env.insert(key.as_ref().into(), value.as_ref().into());
        self
    }

    pub fn unset_env(&mut self, key: &str) -> &mut Self {
        self.env.remove(key);
        self
    }

    pub fn set_bin<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, bin: V) -> &mut Self {
        self.bins.insert(key.as_ref().into(), bin.as_ref().into());
        self
    }

    pub fn set_api_level(&mut self, level: u32) -> &mut Self {
        self.api_level = level;
        self
    }

    pub fn to_abs<P: AsRef<Path> + ?Sized>(&self, path: &P) -> PathBuf {
        self.base_dir.join(path)
    }

    pub fn to_abs_string<P: AsRef<Path> + ?Sized>(&self, path: &P) -> String {
        path_must_str(&self.base_dir.join(path)).into()
    }

    pub fn get_temp_path(&self, suffix: Option<&str>) -> PathBuf {
        let mut rng = rand::thread_rng();
        let rand_name: u64 = rng.gen();
        let name = match suffix {
            Some(v) => format!("{}.{}", rand_name, v),
            None => rand_name.to_string(),
        };
        self.base_dir.join(name)
    }

    pub fn get_temp_dir(&self) -> PathBuf {
        self.get_temp_path(None)
    }

    pub fn new_tmp_file(&self, content: &str) -> anyhow::Result<PathBuf> {
        self.new_tmp_file_suffix(None, content)
    }

    pub fn new_tmp_file_suffix(
        &self,
        suffix: Option<&str>,
        content: &str,
    ) -> anyhow::Result<PathBuf> {
        let path = self.get_temp_path(suffix);
        fs::write(&path, content).with_context(|| "failed to write content to temp file")?;
        Ok(path)
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let td = &self.base_dir;
        if td.exists() {
            fs::remove_dir_all(td).expect("failed to clear test dir");
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        let mut rng = rand::thread_rng();
        let rand_name: u64 = rng.gen();
        let td = env::temp_dir().join(format!("hostcts_test_base_{}", rand_name));

        if td.exists() {
            fs::remove_dir_all(&td).expect("failed to clear test dir");
        }

        ensure_dir_exists(&td).expect("failed to create default test dir");

        let mut env = HashMap::new();
        env.insert("HOSTCTS_PROJECT_HOME".into(), td.to_string_lossy().into());
        env.insert("ANDROID_SERIAL".into(), "TESTSERIAL".into());

        let mut bins = HashMap::new();
        bins.insert("adb".into(), "/usr/bin/adb".into());

        Self {
            base_dir: td,
            api_level: Self::API_LEVEL,
            env,
            bins,
        }
    }
}

impl Context for TestContext {
    fn get_target_api_level(&self) -> crate::Result<u32> {
        Ok(self.api_level)
    }

    fn maybe_get_env(&self, key: &str) -> Option<String> {
        self.env.get(key).map(String::from)
    }

    fn maybe_get_bin(&self, bin: &str) -> Option<String> {
        self.bins.get(bin).map(String::from)
    }

    fn get_user_local_dir(&self) -> crate::Result<PathBuf> {
        Ok(self.base_dir.join("local"))
    }

    fn get_project_config<'a>(&'a self) -> crate::Result<Option<&'a Config>> {
        Ok(None)
    }
}
