use std::fmt;

use clap::{self, Args};
use hostcts::adb::{Adb, ExecAdb};
use hostcts::{Context, DefaultContext};

#[derive(Args)]
pub struct RunCheck {}

enum Importance {
    Optional,
    Required,
}

enum Status {
    Missing,
    Exists(String),
}

struct Info {
    name: String,
    status: Status,
    importance: Importance,
}

fn check_bin(ctx: &dyn Context, bin: &str, importance: Importance) -> Info {
    let status = match ctx.maybe_get_bin(bin) {
        None => Status::Missing,
        Some(path) => Status::Exists(path),
    };

    Info {
        name: bin.into(),
        status,
        importance,
    }
}

fn check_env(ctx: &dyn Context, env: &str, importance: Importance) -> Info {
    let status = match ctx.maybe_get_env(env) {
        None => Status::Missing,
        Some(env) => Status::Exists(env),
    };

    Info {
        name: env.into(),
        status,
        importance,
    }
}

fn check_device(ctx: &dyn Context) -> Info {
    let status = match ExecAdb::new(ctx).and_then(|adb| adb.get_connected_devices()) {
        Ok(devices) => Status::Exists(devices.join(", ")),
        Err(e) => {
            log::debug!("device check failed: {}", e);
            Status::Missing
        }
    };
    Info {
        name: "device".into(),
        status,
        importance: Importance::Required,
    }
}

#[cfg(feature = "emoji")]
mod status {
    pub const FAIL: &'static str = "💩";
    pub const OK: &'static str = "🚀";
    pub const MEH: &'static str = "😒";
}

#[cfg(not(feature = "emoji"))]
mod status {
    pub const FAIL: &'static str = "Fail";
    pub const OK: &'static str = "Ok";
    pub const MEH: &'static str = "Meh";
}

use status::*;

impl RunCheck {
    pub fn run(&self, ctx: &DefaultContext) -> anyhow::Result<()> {
        let mut checks = vec![
            check_bin(ctx, "adb", Importance::Required),
            check_bin(ctx, "sepolicy-analyze", Importance::Optional),
        ];

        println!("External programs:");
        #[cfg(feature = "emoji")]
        {
            println!("\n{} = Present", OK);
            println!("{} = Required and missing", FAIL);
            println!("{} = Optional and missing\n", MEH);
        }

        for c in checks.iter() {
            println!("{}", c);
        }

        checks.clear();
        checks.push(check_env(ctx, "HOSTCTS_PROJECT_HOME", Importance::Required));
        checks.push(check_env(ctx, "ANDROID_SERIAL", Importance::Optional));

        println!("\nEnvironmental variables:\n");
        for c in checks.iter() {
            println!("{}", c);
        }

        println!("\nDevice:\n");
        println!("{}", check_device(ctx));

        Ok(())
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.status {
            Status::Missing => {
                write!(
                    f,
                    "{}: {}",
                    match self.importance {
                        Importance::Optional => MEH,
                        Importance::Required => FAIL,
                    },
                    self.name
                )
            }
            Status::Exists(path) => {
                write!(f, "{}: {} ({})", OK, self.name, path)
            }
        }
    }
}
