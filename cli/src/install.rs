use std::path::PathBuf;

use clap::{self, Args};

use hostcts::install::{install_app_as_user, InstallMultiple};
use hostcts::DefaultContext;

use crate::parsers::ApkPathValueParser;
use crate::utils::get_adb;

#[derive(Args)]
pub struct Install {
    /// ABI passed to `pm install-create --abi`
    #[arg(short, long, conflicts_with = "natural_abi")]
    abi: Option<String>,

    /// Let the package manager pick the ABI
    #[arg(short, long)]
    natural_abi: bool,

    /// Add the splits to this already installed package
    #[arg(short, long)]
    inherit_from: Option<String>,

    /// Extra argument for `pm install-create`, can be given multiple times
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Install a single APK for this user with `pm install --user`
    #[arg(short, long, conflicts_with_all = ["abi", "natural_abi", "inherit_from", "args"])]
    user: Option<i32>,

    /// Succeed only if the package manager rejects the install
    #[arg(long)]
    expect_failure: bool,

    /// APKs to install in a single session
    #[arg(required = true, value_parser = ApkPathValueParser)]
    apks: Vec<PathBuf>,
}

impl Install {
    pub fn run(&self) -> anyhow::Result<()> {
        let ctx = DefaultContext::new();
        let adb = get_adb(&ctx)?;

        if let Some(user) = self.user {
            if self.apks.len() != 1 {
                anyhow::bail!("--user installs exactly one APK");
            }
            install_app_as_user(&adb, &self.apks[0], user)?;
            println!("installed {} for user {}", self.apks[0].to_string_lossy(), user);
            return Ok(());
        }

        let abi = self.abi.as_deref().unwrap_or("");
        let mut install = InstallMultiple::new(&adb, abi);
        if self.natural_abi || self.abi.is_none() {
            install = install.use_natural_abi();
        }
        if let Some(pkg) = &self.inherit_from {
            install = install.inherit_from(pkg);
        }
        for arg in &self.args {
            install = install.add_arg(arg);
        }
        install = install.add_apks(self.apks.iter().cloned());

        if self.expect_failure {
            let reason = install.run_expecting_failure()?;
            println!("rejected as expected: {}", reason);
        } else {
            let session = install.run()?;
            println!("session {} committed", session);
        }
        Ok(())
    }
}
