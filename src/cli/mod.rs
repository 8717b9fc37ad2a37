//! Command-line surface: one subcommand per user action.

use crate::api::HttpApi;
use crate::app::App;
use crate::config::Config;
use crate::store::IdentityStore;
use crate::ui::{self, View};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "restudy",
    version,
    about = "Save pages for spaced-repetition review"
)]
pub struct Cli {
    /// Server base URL (overrides config file and environment)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Data directory holding the config file and identity store
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Assume yes for confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the current registration and verification state
    Status,
    /// Register this device for an email address
    Register {
        /// Email address to register
        email: String,
    },
    /// Check whether the email verification has completed
    CheckAuth,
    /// Abandon a pending registration to use another email
    Reset,
    /// Save a URL for spaced-repetition review
    Save {
        /// The URL to schedule reviews for
        url: String,
    },
    /// List or remove the account's registered devices
    Devices {
        #[command(subcommand)]
        command: Option<DeviceCommand>,
    },
    /// Erase the local identity for this device
    Logout,
}

#[derive(Debug, Subcommand)]
pub enum DeviceCommand {
    /// List registered devices
    List,
    /// Remove a device by identifier
    Remove {
        /// Identifier of the device to remove
        identifier: String,
    },
}

/// Build the app, run one action, render the resulting screen.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::resolve(cli.data_dir, cli.base_url)?;
    config.ensure_data_dir()?;
    tracing::debug!(base_url = %config.base_url, "resolved configuration");

    let store = IdentityStore::open(&config.identity_db_path())?;
    let api = HttpApi::new(config.base_url)?;
    let mut app = App::new(api, store);
    app.startup();

    match cli.command {
        // Startup already selected the view; nothing else to do.
        Command::Status => {}
        Command::Register { email } => app.register(&email).await,
        Command::CheckAuth => app.check_auth().await,
        Command::Reset => app.reset(),
        Command::Save { url } => app.save_url(&url).await,
        Command::Devices { command } => match command.unwrap_or(DeviceCommand::List) {
            DeviceCommand::List => app.show_devices().await,
            DeviceCommand::Remove { identifier } => {
                let confirmed =
                    app.view() == View::Main && (cli.yes || confirm("Remove this device?")?);
                app.delete_device(&identifier, confirmed).await;
            }
        },
        Command::Logout => {
            let confirmed = app.view() == View::Main && (cli.yes || confirm("Log out?")?);
            app.logout(confirmed);
        }
    }

    ui::render(&app.screen);
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
