//! siteref - website reference tracker for a chat channel
//!
//! Runs the chat commands against the local catalog. Each subcommand maps to
//! one `!command`; `chat` takes raw message text the way a chat connector
//! would hand it over.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/siteref/websites.db (~/.local/share/siteref/websites.db)
//! - Logs: $XDG_STATE_HOME/siteref/siteref.log (~/.local/state/siteref/siteref.log)
//! - Config: $XDG_CONFIG_HOME/siteref/config.toml (~/.config/siteref/config.toml)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use siteref_core::{Command, CommandHandler, Config, Database};

#[derive(Parser)]
#[command(name = "siteref")]
#[command(about = "Track websites referenced in a chat channel")]
#[command(version)]
struct Args {
    /// Who the command runs as (defaults to $USER)
    #[arg(long = "as", global = true)]
    author: Option<String>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Add a website with a description
    AddWebsite {
        url: String,
        /// Description, the remaining words are joined with spaces
        description: Vec<String>,
    },

    /// Replace the description of a tracked website
    UpdateDescription {
        url: String,
        #[arg(required = true)]
        description: Vec<String>,
    },

    /// List tracked websites by reference count
    ListWebsites,

    /// Show everything stored about one website
    SiteInfo { url: String },

    /// List the chat commands
    Commands,

    /// Handle raw chat message text, e.g. "!site_info https://example.com"
    Chat { text: String },
}

impl Action {
    fn into_command(self) -> Option<Command> {
        let command = match self {
            Action::AddWebsite { url, description } => Command::AddWebsite {
                url,
                description: join_words(description),
            },
            Action::UpdateDescription { url, description } => Command::UpdateDescription {
                url,
                description: join_words(description).unwrap_or_default(),
            },
            Action::ListWebsites => Command::ListWebsites,
            Action::SiteInfo { url } => Command::SiteInfo { url },
            Action::Commands => Command::Help,
            Action::Chat { .. } => return None,
        };
        Some(command)
    }
}

fn join_words(words: Vec<String>) -> Option<String> {
    let joined = words.join(" ");
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn default_author() -> String {
    std::env::var("USER")
        .ok()
        .filter(|user| !user.is_empty())
        .unwrap_or_else(|| "cli".to_string())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let _log_guard =
        siteref_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("siteref starting");

    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let author = args.author.unwrap_or_else(default_author);
    let handler = CommandHandler::new(&db, config.chat.command_prefix.clone());

    let replies = match args.command {
        Action::Chat { text } => match handler.handle_message(&text, &author) {
            Some(replies) => replies,
            None => {
                tracing::debug!(text = %text, "Message is not a command");
                return Ok(());
            }
        },
        action => match action.into_command() {
            Some(command) => handler.execute(&command, &author),
            None => return Ok(()),
        },
    };

    for reply in replies {
        println!("{}", reply.trim_end());
    }

    Ok(())
}
