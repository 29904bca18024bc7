use clap::{self, Args, Subcommand};
use crossterm::style::Color;

use hostcts::users::{UserManager, OWNER_USER_ID};
use hostcts::{Context, DefaultContext};

use crate::printer::Printer;
use crate::utils::{get_adb, print_json};

#[derive(Args)]
pub struct User {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the users on the device
    #[command()]
    List(List),

    /// Create a secondary user and print its id
    #[command()]
    Create,

    /// Create a managed profile and print its id
    #[command()]
    CreateProfile(CreateProfile),

    /// Start a user and wait until it is running
    #[command()]
    Start(UserId),

    /// Remove a user
    #[command()]
    Remove(Remove),

    /// Print the serial number of a user
    #[command()]
    Serial(UserId),
}

#[derive(Args)]
struct List {
    /// Print the users as JSON
    #[arg(short, long)]
    json: bool,
}

#[derive(Args)]
struct CreateProfile {
    /// The user owning the profile
    #[arg(short, long, default_value_t = OWNER_USER_ID)]
    parent: i32,
}

#[derive(Args)]
struct UserId {
    #[arg()]
    user_id: i32,
}

#[derive(Args)]
struct Remove {
    /// Remove every user except the owner
    #[arg(short, long, conflicts_with = "user_id")]
    all: bool,

    #[arg(required_unless_present = "all")]
    user_id: Option<i32>,
}

impl User {
    pub fn run(&self) -> anyhow::Result<()> {
        let ctx = DefaultContext::new();
        let adb = get_adb(&ctx)?;
        let wait = ctx.get_harness_config()?.wait;
        let mut users = UserManager::new(&adb, wait);

        match &self.command {
            Command::List(c) => {
                let list = users.list_users()?;
                if c.json {
                    return print_json(&list);
                }
                let printer = Printer::new();
                for user in list {
                    printer.print(format!("{}: {}", user.id, user.name));
                    if user.running {
                        printer.println_colored(" running", Color::Green);
                    } else {
                        printer.println("");
                    }
                }
            }
            Command::Create => {
                if !users.supports_multiple_users()? {
                    anyhow::bail!("device doesn't support multiple users");
                }
                println!("{}", users.create_user()?);
            }
            Command::CreateProfile(c) => {
                println!("{}", users.create_managed_profile(c.parent)?);
            }
            Command::Start(c) => users.start_user(c.user_id)?,
            Command::Remove(c) => match c.user_id {
                Some(OWNER_USER_ID) => anyhow::bail!("refusing to remove the owner"),
                Some(id) => users.remove_user(id),
                None => users.remove_all_secondary_users()?,
            },
            Command::Serial(c) => println!("{}", users.get_user_serial_number(c.user_id)?),
        }
        Ok(())
    }
}
