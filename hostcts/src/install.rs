use std::path::{Path, PathBuf};

use crate::adb::Adb;
use crate::response::{parse_session_id, Reply};
use crate::{Context, Error};

/// Where APKs are staged on the device before being handed to `pm`
pub const REMOTE_TMP_DIR: &str = "/data/local/tmp";

/// Mapping from ABI name to the split APK carrying that ABI's native code.
///
/// Built once from configuration and handed to whatever needs it; it is
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiSplits {
    entries: Vec<(String, String)>,
}

impl Default for AbiSplits {
    fn default() -> Self {
        Self::new(
            [
                ("x86", "CtsSplitApp_x86.apk"),
                ("x86_64", "CtsSplitApp_x86_64.apk"),
                ("armeabi-v7a", "CtsSplitApp_armeabi-v7a.apk"),
                ("armeabi", "CtsSplitApp_armeabi.apk"),
                ("arm64-v8a", "CtsSplitApp_arm64-v8a.apk"),
                ("mips64", "CtsSplitApp_mips64.apk"),
                ("mips", "CtsSplitApp_mips.apk"),
            ]
            .into_iter()
            .map(|(abi, apk)| (abi.to_string(), apk.to_string())),
        )
    }
}

impl AbiSplits {
    /// Later entries for an ABI replace earlier ones
    pub fn new<I: IntoIterator<Item = (String, String)>>(entries: I) -> Self {
        let mut deduped: Vec<(String, String)> = Vec::new();
        for (abi, apk) in entries {
            match deduped.iter_mut().find(|(a, _)| *a == abi) {
                Some(existing) => existing.1 = apk,
                None => deduped.push((abi, apk)),
            }
        }
        Self { entries: deduped }
    }

    pub fn get(&self, abi: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(a, _)| a == abi)
            .map(|(_, apk)| apk.as_str())
    }

    /// Like [AbiSplits::get] but missing ABIs are an assertion failure
    pub fn must_get(&self, abi: &str) -> crate::Result<&str> {
        self.get(abi)
            .ok_or_else(|| Error::Assertion(format!("failed to find APK for ABI {}", abi)))
    }

    pub fn apks(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, apk)| apk.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Locates test APKs by file name
#[derive(Debug, Clone)]
pub struct TestApps {
    dir: PathBuf,
}

impl TestApps {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_ctx(ctx: &dyn Context) -> crate::Result<Self> {
        Ok(Self::new(ctx.get_apk_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, name: &str) -> crate::Result<PathBuf> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Err(Error::MissingFile(path.to_string_lossy().into_owned()));
        }
        Ok(path)
    }
}

fn apk_file_name(apk: &Path) -> crate::Result<&str> {
    apk.file_name()
        .and_then(|it| it.to_str())
        .ok_or_else(|| Error::Generic(format!("invalid APK path {}", apk.to_string_lossy())))
}

fn local_path_str(apk: &Path) -> crate::Result<&str> {
    apk.to_str()
        .ok_or_else(|| Error::Generic(format!("invalid APK path {}", apk.to_string_lossy())))
}

/// Push `local` to `remote`, any failure aborts with [Error::PushFailed]
pub fn push_file(adb: &dyn Adb, local: &str, remote: &str) -> crate::Result<()> {
    let out = adb.push(local, remote)?;
    if !out.ok() {
        return Err(Error::PushFailed(format!(
            "{} to {}: {}",
            local,
            remote,
            out.stderr_utf8_lossy().trim()
        )));
    }
    Ok(())
}

/// Builds and runs a multi-APK install session:
///
/// ```text
/// pm install-create [args] [--abi <abi>]
/// pm install-write <session> <index>_<name> /data/local/tmp/<index>_<name>   (per APK)
/// pm install-commit <session>
/// ```
///
/// The builder is consumed by [InstallMultiple::run] or
/// [InstallMultiple::run_expecting_failure]. A session abandoned by a failed
/// write is left on the device.
pub struct InstallMultiple<'a> {
    adb: &'a dyn Adb,
    abi: String,
    args: Vec<String>,
    apks: Vec<PathBuf>,
    natural_abi: bool,
}

impl<'a> InstallMultiple<'a> {
    /// `abi` is forced on the session unless [InstallMultiple::use_natural_abi]
    /// is called
    pub fn new(adb: &'a dyn Adb, abi: &str) -> Self {
        Self {
            adb,
            abi: abi.into(),
            args: Vec::new(),
            apks: Vec::new(),
            natural_abi: false,
        }
    }

    pub fn add_arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn add_apk<P: Into<PathBuf>>(mut self, apk: P) -> Self {
        self.apks.push(apk.into());
        self
    }

    pub fn add_apks<I, P>(mut self, apks: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.apks.extend(apks.into_iter().map(Into::into));
        self
    }

    /// Layer the new APKs on top of the installed `package`
    pub fn inherit_from(self, package: &str) -> Self {
        self.add_arg("-r").add_arg(format!("-p {}", package))
    }

    /// Let the device pick the ABI instead of forcing one
    pub fn use_natural_abi(mut self) -> Self {
        self.natural_abi = true;
        self
    }

    pub fn create_command(&self) -> String {
        let mut cmd = String::from("pm install-create");
        for arg in &self.args {
            cmd.push(' ');
            cmd.push_str(arg);
        }
        if !self.natural_abi {
            cmd.push_str(" --abi ");
            cmd.push_str(&self.abi);
        }
        cmd
    }

    /// Run the session and require every step to succeed. Returns the
    /// session id.
    pub fn run(self) -> crate::Result<i64> {
        let (session, reply) = self.execute()?;
        Reply::new(&reply).expect_success(&format!("pm install-commit {}", session))?;
        log::info!("install session {} committed", session);
        Ok(session)
    }

    /// Run the session requiring creation and writes to succeed but the
    /// commit to fail. Returns the commit reply.
    pub fn run_expecting_failure(self) -> crate::Result<String> {
        let (session, reply) = self.execute()?;
        Reply::new(&reply).expect_failure(&format!("pm install-commit {}", session))?;
        log::info!(
            "install session {} rejected as expected: {}",
            session,
            reply.trim()
        );
        Ok(reply)
    }

    /// Create, write and commit, returning the session id and the commit reply
    fn execute(self) -> crate::Result<(i64, String)> {
        let adb = self.adb;

        let create = self.create_command();
        let reply = adb.shell_text(&create)?;
        Reply::new(&reply).expect_success(&create)?;
        let session = parse_session_id(&reply)?;
        log::debug!(
            "created install session {} for {} APK(s)",
            session,
            self.apks.len()
        );

        for (i, apk) in self.apks.iter().enumerate() {
            let staged = format!("{}_{}", i, apk_file_name(apk)?);
            let remote = format!("{}/{}", REMOTE_TMP_DIR, staged);
            push_file(adb, local_path_str(apk)?, &remote)?;

            let write = format!("pm install-write {} {} {}", session, staged, remote);
            let reply = adb.shell_text(&write)?;
            Reply::new(&reply).expect_success(&write)?;
        }

        let reply = adb.shell_text(&format!("pm install-commit {}", session))?;
        Ok((session, reply))
    }
}

/// Install a single APK with `adb install -r`
pub fn install_app(adb: &dyn Adb, apk: &Path) -> crate::Result<()> {
    log::info!("installing app {}", apk.to_string_lossy());
    adb.install(local_path_str(apk)?)
}

/// Install an APK for one user only
pub fn install_app_as_user(adb: &dyn Adb, apk: &Path, user_id: i32) -> crate::Result<()> {
    let remote = format!("{}/{}", REMOTE_TMP_DIR, apk_file_name(apk)?);
    push_file(adb, local_path_str(apk)?, &remote)?;

    let cmd = format!("pm install --user {} {}", user_id, remote);
    let reply = adb.shell_text(&cmd)?;
    if !Reply::new(&reply).has_success_line() {
        return Err(Error::Assertion(format!(
            "failed to install {} for user {}: {}",
            apk.to_string_lossy(),
            user_id,
            reply.trim()
        )));
    }
    log::info!("installed {} for user {}", remote, user_id);
    Ok(())
}

pub fn is_package_installed(adb: &dyn Adb, package: &str) -> crate::Result<bool> {
    let reply = adb.shell_text(&format!("pm list packages {}", package))?;
    Ok(reply
        .lines()
        .filter_map(|it| it.trim().strip_prefix("package:"))
        .any(|it| it == package))
}

/// Uninstall `package`, doing nothing if it isn't installed
pub fn uninstall_package(adb: &dyn Adb, package: &str) -> crate::Result<()> {
    if !is_package_installed(adb, package)? {
        log::debug!("{} not installed, nothing to uninstall", package);
        return Ok(());
    }
    log::info!("uninstalling {}", package);
    adb.uninstall(package)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{failed_output, mock_adb, ok_output, tmp_context, MockAdb, TestContext};
    use mockall::Sequence;
    use rstest::*;

    const CREATE_REPLY: &str = "Success: created install session [42]\n";

    fn expect_shell(adb: &mut MockAdb, seq: &mut Sequence, cmd: &str, reply: &'static str) {
        let cmd = cmd.to_string();
        adb.expect_shell()
            .withf(move |it: &str| it == cmd)
            .times(1)
            .in_sequence(seq)
            .returning(move |_| ok_output(reply));
    }

    fn expect_push(adb: &mut MockAdb, seq: &mut Sequence, local: &str, remote: &str) {
        let local = local.to_string();
        let remote = remote.to_string();
        adb.expect_push()
            .withf(move |l: &str, r: &str| l == local && r == remote)
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| ok_output(""));
    }

    #[rstest]
    fn test_abi_splits() {
        let splits = AbiSplits::default();
        assert_eq!(splits.len(), 7);
        assert_eq!(splits.get("arm64-v8a"), Some("CtsSplitApp_arm64-v8a.apk"));
        assert!(splits.must_get("riscv64").unwrap_err().is_assertion());

        let custom = AbiSplits::new(vec![
            ("x86".to_string(), "a.apk".to_string()),
            ("x86".to_string(), "b.apk".to_string()),
        ]);
        assert_eq!(custom.len(), 1);
        assert_eq!(custom.get("x86"), Some("b.apk"));
        assert_eq!(custom.apks().collect::<Vec<_>>(), vec!["b.apk"]);
    }

    #[rstest]
    fn test_create_command() {
        let adb = MockAdb::new();
        let install = InstallMultiple::new(&adb, "x86_64");
        assert_eq!(install.create_command(), "pm install-create --abi x86_64");

        let install = InstallMultiple::new(&adb, "x86_64")
            .inherit_from("com.android.cts.splitapp")
            .use_natural_abi();
        assert_eq!(
            install.create_command(),
            "pm install-create -r -p com.android.cts.splitapp"
        );
    }

    #[rstest]
    fn test_three_apks_in_order(mut mock_adb: MockAdb) {
        let mut seq = Sequence::new();
        expect_shell(
            &mut mock_adb,
            &mut seq,
            "pm install-create --abi arm64-v8a",
            CREATE_REPLY,
        );
        for (i, name) in ["base.apk", "split_a.apk", "split_b.apk"].iter().enumerate() {
            let remote = format!("/data/local/tmp/{}_{}", i, name);
            expect_push(&mut mock_adb, &mut seq, &format!("/apks/{}", name), &remote);
            expect_shell(
                &mut mock_adb,
                &mut seq,
                &format!("pm install-write 42 {}_{} {}", i, name, remote),
                "Success: streamed 100 bytes\n",
            );
        }
        expect_shell(&mut mock_adb, &mut seq, "pm install-commit 42", "Success\n");

        let session = InstallMultiple::new(&mock_adb, "arm64-v8a")
            .add_apk("/apks/base.apk")
            .add_apks(["/apks/split_a.apk", "/apks/split_b.apk"])
            .run()
            .expect("install should succeed");
        assert_eq!(session, 42);
    }

    #[rstest]
    fn test_negative_session_stops_install(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .withf(|it: &str| it == "pm install-create")
            .times(1)
            .returning(|_| ok_output("Success: created install session [-1]\n"));
        mock_adb.expect_push().never();

        let err = InstallMultiple::new(&mock_adb, "x86")
            .use_natural_abi()
            .add_apk("/apks/base.apk")
            .run()
            .unwrap_err();
        assert!(err.is_assertion(), "{:?}", err);
    }

    #[rstest]
    fn test_commit_failure(mut mock_adb: MockAdb) {
        let mut seq = Sequence::new();
        expect_shell(&mut mock_adb, &mut seq, "pm install-create", CREATE_REPLY);
        expect_push(&mut mock_adb, &mut seq, "/apks/base.apk", "/data/local/tmp/0_base.apk");
        expect_shell(
            &mut mock_adb,
            &mut seq,
            "pm install-write 42 0_base.apk /data/local/tmp/0_base.apk",
            "Success\n",
        );
        expect_shell(
            &mut mock_adb,
            &mut seq,
            "pm install-commit 42",
            "Failure [INSTALL_FAILED_INVALID_APK: Split null was defined multiple times]\n",
        );

        let err = InstallMultiple::new(&mock_adb, "x86")
            .use_natural_abi()
            .add_apk("/apks/base.apk")
            .run()
            .unwrap_err();
        assert!(err.is_assertion());
        assert!(err.to_string().contains("INSTALL_FAILED_INVALID_APK"));
    }

    #[rstest]
    fn test_run_expecting_failure(mut mock_adb: MockAdb) {
        let mut seq = Sequence::new();
        expect_shell(&mut mock_adb, &mut seq, "pm install-create --abi x86", CREATE_REPLY);
        expect_push(&mut mock_adb, &mut seq, "/apks/base.apk", "/data/local/tmp/0_base.apk");
        expect_shell(
            &mut mock_adb,
            &mut seq,
            "pm install-write 42 0_base.apk /data/local/tmp/0_base.apk",
            "Success\n",
        );
        expect_shell(
            &mut mock_adb,
            &mut seq,
            "pm install-commit 42",
            "Failure [INSTALL_FAILED_UPDATE_INCOMPATIBLE]\n",
        );

        let reply = InstallMultiple::new(&mock_adb, "x86")
            .add_apk("/apks/base.apk")
            .run_expecting_failure()
            .expect("a failing commit is what we wanted");
        assert!(reply.contains("INSTALL_FAILED_UPDATE_INCOMPATIBLE"));
    }

    #[rstest]
    fn test_run_expecting_failure_but_commit_succeeds(mut mock_adb: MockAdb) {
        let mut seq = Sequence::new();
        expect_shell(&mut mock_adb, &mut seq, "pm install-create --abi x86", CREATE_REPLY);
        expect_shell(&mut mock_adb, &mut seq, "pm install-commit 42", "Success\n");

        let err = InstallMultiple::new(&mock_adb, "x86")
            .run_expecting_failure()
            .unwrap_err();
        assert!(err.is_assertion());
    }

    #[rstest]
    fn test_run_expecting_failure_create_fails(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .withf(|it: &str| it.starts_with("pm install-create"))
            .times(1)
            .returning(|_| ok_output("Error: java.lang.IllegalArgumentException\n"));
        mock_adb.expect_push().never();

        let err = InstallMultiple::new(&mock_adb, "x86")
            .add_apk("/apks/base.apk")
            .run_expecting_failure()
            .unwrap_err();
        assert!(err.is_assertion());
    }

    #[rstest]
    fn test_missing_session_id(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .times(1)
            .returning(|_| ok_output("Success: created install session\n"));
        mock_adb.expect_push().never();

        let err = InstallMultiple::new(&mock_adb, "x86")
            .add_apk("/apks/base.apk")
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::Harness(_)));
    }

    #[rstest]
    fn test_push_failure_aborts(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .withf(|it: &str| it.starts_with("pm install-create"))
            .times(1)
            .returning(|_| ok_output(CREATE_REPLY));
        mock_adb
            .expect_push()
            .times(1)
            .returning(|_, _| failed_output("adb: error: failed to copy"));

        let err = InstallMultiple::new(&mock_adb, "x86")
            .add_apk("/apks/base.apk")
            .add_apk("/apks/split.apk")
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::PushFailed(ref m) if m.contains("/apks/base.apk")));
    }

    #[rstest]
    fn test_install_app_as_user(mut mock_adb: MockAdb) {
        mock_adb
            .expect_push()
            .withf(|l: &str, r: &str| l == "/apks/Launcher.apk" && r == "/data/local/tmp/Launcher.apk")
            .times(1)
            .returning(|_, _| ok_output(""));
        mock_adb
            .expect_shell()
            .withf(|it: &str| it == "pm install --user 10 /data/local/tmp/Launcher.apk")
            .times(1)
            .returning(|_| ok_output("\tpkg: /data/local/tmp/Launcher.apk\nSuccess\n"));

        install_app_as_user(&mock_adb, Path::new("/apks/Launcher.apk"), 10).unwrap();
    }

    #[rstest]
    fn test_uninstall_absent_package(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .withf(|it: &str| it == "pm list packages com.android.cts.splitapp")
            .times(1)
            .returning(|_| ok_output("package:com.android.cts.splitapp.other\n"));
        mock_adb.expect_uninstall().never();

        uninstall_package(&mock_adb, "com.android.cts.splitapp").unwrap();
    }

    #[rstest]
    fn test_uninstall_present_package(mut mock_adb: MockAdb) {
        mock_adb
            .expect_shell()
            .times(1)
            .returning(|_| ok_output("package:com.android.cts.splitapp\n"));
        mock_adb
            .expect_uninstall()
            .withf(|it: &str| it == "com.android.cts.splitapp")
            .times(1)
            .returning(|_| Ok(()));

        uninstall_package(&mock_adb, "com.android.cts.splitapp").unwrap();
    }

    #[rstest]
    fn test_test_apps(tmp_context: TestContext) {
        let apps = TestApps::from_ctx(&tmp_context).unwrap();
        std::fs::create_dir_all(apps.dir()).unwrap();
        std::fs::write(apps.dir().join("CtsSplitApp.apk"), b"PK").unwrap();

        assert!(apps.get("CtsSplitApp.apk").is_ok());
        assert!(matches!(
            apps.get("CtsSplitApp_fr.apk"),
            Err(Error::MissingFile(_))
        ));
    }
}
