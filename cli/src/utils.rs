use anyhow::bail;
use serde::Serialize;

use hostcts::adb::{Adb, ExecAdb};
use hostcts::Context;

/// An [ExecAdb] for the configured device that has been checked to be
/// connected
pub fn get_adb(ctx: &dyn Context) -> anyhow::Result<ExecAdb> {
    let adb = ExecAdb::new(ctx)?;
    let devices = adb.get_connected_devices()?;
    if !adb.has_serial() && devices.len() > 1 {
        bail!(
            "multiple devices connected ({}), set ANDROID_SERIAL or the device.adb.serial config",
            devices.join(", ")
        );
    }
    Ok(adb)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
