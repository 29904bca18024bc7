use std::io;
use std::process::ExitStatus;

use mockall::mock;
use rstest::fixture;

use crate::command::CmdOutput;

mock! {
    pub Adb {

    }

    impl crate::adb::Adb for Adb {
        fn get_connected_devices(&self) -> crate::Result<Vec<String>>;
        fn install(&self, apk: &str) -> crate::Result<()>;
        fn uninstall(&self, package: &str) -> crate::Result<()>;
        fn pull(&self, device: &str, local: &str) -> io::Result<CmdOutput>;
        fn push(&self, local: &str, device: &str) -> io::Result<CmdOutput>;
        fn shell(&self, shell_cmd: &str) -> io::Result<CmdOutput>;
    }
}

#[fixture]
pub fn mock_adb() -> MockAdb {
    MockAdb::new()
}

/// A successful command that printed `stdout`
pub fn ok_output(stdout: &str) -> io::Result<CmdOutput> {
    Ok(CmdOutput {
        status: ExitStatus::default(),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    })
}

/// A command that exited with status 1 and printed `stderr`
#[cfg(unix)]
pub fn failed_output(stderr: &str) -> io::Result<CmdOutput> {
    use std::os::unix::process::ExitStatusExt;
    Ok(CmdOutput {
        status: ExitStatus::from_raw(1 << 8),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    })
}
