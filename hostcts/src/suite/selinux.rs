use std::path::PathBuf;

use tempfile::TempDir;

use crate::suite::{Harness, HostTest, Verdict};
use crate::utils::path_must_str;
use crate::{run_cmd, Error};

pub const NAME: &str = "selinux";

pub const TESTS: &[&str] = &["all_enforcing"];

const DEVICE_POLICY: &str = "/sys/fs/selinux/policy";

/// Every SELinux domain in the device's running policy must be enforcing
pub struct SelinuxSuite<'a> {
    h: &'a Harness<'a>,
    sepolicy_analyze: Option<String>,
    // keeps the pulled policy alive until tear down
    workdir: Option<TempDir>,
    policy: Option<PathBuf>,
}

impl<'a> SelinuxSuite<'a> {
    pub fn new(h: &'a Harness<'a>) -> Self {
        Self {
            h,
            sepolicy_analyze: None,
            workdir: None,
            policy: None,
        }
    }

    fn all_enforcing(&self) -> crate::Result<Verdict> {
        let (Some(analyze), Some(policy)) = (&self.sepolicy_analyze, &self.policy) else {
            return Err(Error::Harness("selinux suite used before set up".into()));
        };
        let out = run_cmd(analyze, &[path_must_str(policy), "permissive"])?;
        let mut domains = out.stdout_utf8_lossy().into_owned();
        domains.push_str(&out.stderr_utf8_lossy());
        if !domains.trim().is_empty() {
            return Err(Error::Assertion(format!(
                "the following SELinux domains were found to be in permissive mode:\n{}",
                domains
            )));
        }
        Ok(Verdict::Passed)
    }
}

impl<'a> HostTest for SelinuxSuite<'a> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn test_names(&self) -> &'static [&'static str] {
        TESTS
    }

    fn set_up(&mut self) -> crate::Result<()> {
        self.sepolicy_analyze = Some(self.h.ctx().get_bin("sepolicy-analyze")?);

        let td = tempfile::Builder::new()
            .prefix("hostcts_sepolicy_")
            .tempdir()?;
        let policy = td.path().join("policy");
        log::debug!("pulling {} to {}", DEVICE_POLICY, policy.to_string_lossy());
        self.h
            .adb()
            .pull(DEVICE_POLICY, path_must_str(&policy))?
            .err_on_status()?;

        self.workdir = Some(td);
        self.policy = Some(policy);
        Ok(())
    }

    fn run_test(&mut self, test: &str) -> crate::Result<Verdict> {
        match test {
            "all_enforcing" => self.all_enforcing(),
            _ => Err(Error::Generic(format!("unknown test {}", test))),
        }
    }

    fn tear_down(&mut self) -> crate::Result<()> {
        self.policy = None;
        if let Some(td) = self.workdir.take() {
            td.close()?;
        }
        Ok(())
    }
}
