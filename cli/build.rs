use std::borrow::Cow;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::Command;

fn main() {
    if let Err(e) = write_version_files() {
        panic!("failed to write version files: {:?}", e);
    }
    println!("cargo:rerun-if-env-changed=HOSTCTS_GIT_REVISION");
    println!("cargo:rerun-if-changed=build.rs");
}

fn out_path(name: &str) -> PathBuf {
    PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR")).join(name)
}

fn write_version_files() -> io::Result<()> {
    let version = env::var("CARGO_PKG_VERSION").expect("CARGO_PKG_VERSION");
    let target = env::var("TARGET").expect("TARGET");

    fs::write(out_path("simple_version_string"), format!("\"{}\"", version))?;

    let rev = match git_rev() {
        Some(v) => Cow::Owned(v),
        None => Cow::Borrowed("unknown"),
    };
    fs::write(
        out_path("version_string"),
        format!("r#\"{} ({})\nrev {}\"#", version, target, rev.trim()),
    )
}

/// `HOSTCTS_GIT_REVISION` wins over asking git, for builds outside a checkout
fn git_rev() -> Option<String> {
    if let Ok(rev) = env::var("HOSTCTS_GIT_REVISION") {
        return Some(rev);
    }
    let out = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8(out.stdout).ok()
}
