use std::time::{SystemTime, UNIX_EPOCH};

use crate::adb::Adb;
use crate::command::quote;
use crate::response::{
    parse_created_user_id, parse_max_users, parse_user_list, parse_user_serial, Reply, UserEntry,
};
use crate::wait::WaitPolicy;

/// The user every device has
pub const OWNER_USER_ID: i32 = 0;

fn millis_since_epoch() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|it| it.as_millis())
        .unwrap_or_default()
}

/// Creates, starts and removes device users, remembering the ones it created
/// so that [UserManager::tear_down] can remove them again.
pub struct UserManager<'a> {
    adb: &'a dyn Adb,
    wait: WaitPolicy,
    created: Vec<i32>,
}

impl<'a> UserManager<'a> {
    pub fn new(adb: &'a dyn Adb, wait: WaitPolicy) -> Self {
        Self {
            adb,
            wait,
            created: Vec::new(),
        }
    }

    /// Ids of users created by this manager and not yet removed
    pub fn created_users(&self) -> &[i32] {
        &self.created
    }

    pub fn list_users(&self) -> crate::Result<Vec<UserEntry>> {
        let out = self.adb.shell_text("pm list users")?;
        log::debug!("output for `pm list users`: {}", out.trim());
        parse_user_list(&out)
    }

    pub fn get_max_users(&self) -> crate::Result<i32> {
        let out = self.adb.shell_text("pm get-max-users")?;
        parse_max_users(&out)
    }

    /// Whether the device can host a secondary user
    pub fn supports_multiple_users(&self) -> crate::Result<bool> {
        Ok(self.get_max_users()? > 1)
    }

    /// Create a secondary user and wait for it to be listed
    pub fn create_user(&mut self) -> crate::Result<i32> {
        let cmd = format!("pm create-user TestUser_{}", millis_since_epoch());
        self.create(&cmd)
    }

    /// Create a managed profile of `parent` and wait for it to be listed
    pub fn create_managed_profile(&mut self, parent: i32) -> crate::Result<i32> {
        let cmd = format!(
            "pm create-user --profileOf {} --managed TestProfile_{}",
            parent,
            millis_since_epoch()
        );
        self.create(&cmd)
    }

    fn create(&mut self, cmd: &str) -> crate::Result<i32> {
        log::info!("starting command {}", cmd);
        let out = self.adb.shell_text(cmd)?;
        log::info!("output for command {}: {}", cmd, out.trim());
        let user_id = parse_created_user_id(&out)?;
        self.created.push(user_id);

        self.wait.poll_until(&format!("user {} to be listed", user_id), || {
            Ok(self.list_users()?.iter().any(|it| it.id == user_id))
        })?;
        Ok(user_id)
    }

    /// Start `user_id` so apps can run on it and wait for it to be running
    pub fn start_user(&self, user_id: i32) -> crate::Result<()> {
        let cmd = format!("am start-user {}", user_id);
        log::info!("starting command {}", cmd);
        let out = self.adb.shell_text(&cmd)?;
        log::info!("output for command {}: {}", cmd, out.trim());
        if !Reply::new(&out).is_success_with_payload() {
            return Err(crate::Error::Assertion(format!(
                "{} expected to start with \"Success:\"",
                out.trim()
            )));
        }

        self.wait
            .poll_until(&format!("user {} to be running", user_id), || {
                Ok(self
                    .list_users()?
                    .iter()
                    .any(|it| it.id == user_id && it.running))
            })
    }

    /// Remove `user_id`. This never fails, problems are only logged.
    pub fn remove_user(&mut self, user_id: i32) {
        self.created.retain(|it| *it != user_id);

        let cmd = format!("pm remove-user {}", user_id);
        log::info!("starting command {}", cmd);
        match self.adb.shell_text(&cmd) {
            Ok(out) => log::info!("output for command {}: {}", cmd, out.trim()),
            Err(e) => {
                log::warn!("failed to remove user {}: {}", user_id, e);
                return;
            }
        }

        let res = self
            .wait
            .poll_until(&format!("user {} to be removed", user_id), || {
                Ok(!self.list_users()?.iter().any(|it| it.id == user_id))
            });
        if let Err(e) = res {
            log::warn!("{}", e);
        }
    }

    /// Remove every user except the owner, including ones this manager
    /// didn't create
    pub fn remove_all_secondary_users(&mut self) -> crate::Result<()> {
        for user in self.list_users()? {
            if user.id != OWNER_USER_ID {
                self.remove_user(user.id);
            }
        }
        Ok(())
    }

    pub fn get_user_serial_number(&self, user_id: i32) -> crate::Result<i32> {
        let out = self.adb.shell_text("dumpsys user")?;
        parse_user_serial(&out, user_id)
    }

    pub fn set_profile_owner(&self, component: &str, user_id: i32) -> crate::Result<()> {
        let cmd = format!("dpm set-profile-owner {} {}", quote(component), user_id);
        log::info!("starting command {}", cmd);
        let out = self.adb.shell_text(&cmd)?;
        log::info!("output for command {}: {}", cmd, out.trim());
        if !Reply::new(&out).is_success_with_payload() {
            return Err(crate::Error::Assertion(format!(
                "failed to set {} as profile owner of user {}: {}",
                component,
                user_id,
                out.trim()
            )));
        }
        Ok(())
    }

    /// Remove every user this manager created
    pub fn tear_down(&mut self) {
        for user_id in self.created.clone() {
            self.remove_user(user_id);
        }
    }
}
