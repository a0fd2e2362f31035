//! Chat command surface
//!
//! Parses `!command` text into a [`Command`] and executes it against the
//! catalog, producing the reply messages to send back. Store failures never
//! escape as errors: every outcome is rendered as reply text.

use crate::db::{normalize_url, Database, WebsiteOrder};
use crate::error::Error;
use crate::types::WebsiteRecord;
use std::fmt;

/// Largest message the chat transport accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Length an oversized list is cut to before the ellipsis is appended.
pub const TRUNCATE_AT_CHARS: usize = 1990;

pub const EMPTY_LIST_REPLY: &str = "No websites have been added yet!";
pub const LIST_TOO_LONG_REPLY: &str = "The list is too long! Displaying the top entries:";
pub const ADDED_REPLY: &str = "Website added successfully!";
pub const ALREADY_ADDED_REPLY: &str = "This website is already added!";
pub const MISSING_DESCRIPTION_REPLY: &str =
    "Failed to provide description, please add description to last command.";
const STORE_FAILURE_REPLY: &str =
    "Something went wrong while talking to the website catalog. Please try again later.";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `add_website <url> <description>`
    AddWebsite {
        url: String,
        description: Option<String>,
    },
    /// `update_description <url> <new_description>`
    UpdateDescription { url: String, description: String },
    /// `list_websites`
    ListWebsites,
    /// `site_info <url>`
    SiteInfo { url: String },
    /// `help`
    Help,
}

/// Why a message could not be parsed as a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The message does not start with the command prefix
    NotACommand,
    /// The command name is not recognized
    Unknown(String),
    /// A required argument is missing
    MissingArgument {
        command: &'static str,
        usage: &'static str,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::NotACommand => write!(f, "not a command"),
            ParseError::Unknown(name) => write!(f, "unknown command: {name}"),
            ParseError::MissingArgument { command, usage } => {
                write!(f, "missing argument for {command}, usage: {usage}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl Command {
    /// Parse message text such as `!add_website https://x.io A site`.
    ///
    /// The description of `add_website` and `update_description` is the rest
    /// of the message after the URL.
    pub fn parse(text: &str, prefix: &str) -> Result<Self, ParseError> {
        let body = text
            .trim()
            .strip_prefix(prefix)
            .ok_or(ParseError::NotACommand)?;
        let (name, rest) = split_word(body);

        match name {
            "add_website" => {
                let (url, description) = split_word(rest);
                if url.is_empty() {
                    return Err(missing("add_website"));
                }
                Ok(Command::AddWebsite {
                    url: url.to_string(),
                    description: (!description.is_empty()).then(|| description.to_string()),
                })
            }
            "update_description" => {
                let (url, description) = split_word(rest);
                if url.is_empty() || description.is_empty() {
                    return Err(missing("update_description"));
                }
                Ok(Command::UpdateDescription {
                    url: url.to_string(),
                    description: description.to_string(),
                })
            }
            "list_websites" => Ok(Command::ListWebsites),
            "site_info" => {
                let (url, _) = split_word(rest);
                if url.is_empty() {
                    return Err(missing("site_info"));
                }
                Ok(Command::SiteInfo {
                    url: url.to_string(),
                })
            }
            "help" => Ok(Command::Help),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// Split off the first whitespace-delimited word.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

fn missing(command: &'static str) -> ParseError {
    ParseError::MissingArgument {
        command,
        usage: usage(command),
    }
}

fn usage(command: &str) -> &'static str {
    match command {
        "add_website" => "add_website [url] [description]",
        "update_description" => "update_description [url] [new_description]",
        "site_info" => "site_info [url]",
        "list_websites" => "list_websites",
        _ => "help",
    }
}

/// Static capability listing, one `(usage, summary)` pair per command.
pub const HELP_ENTRIES: [(&str, &str); 5] = [
    (
        "add_website [url] [description]",
        "Add a website to the list with its description.",
    ),
    (
        "update_description [url] [new_description]",
        "Update the description of an existing website.",
    ),
    (
        "list_websites",
        "List all stored websites along with their descriptions and reference counts.",
    ),
    (
        "site_info [url]",
        "Displays a breakdown of all the stored data regarding the website.",
    ),
    ("help", "Displays this help message."),
];

/// Executes commands against the catalog.
pub struct CommandHandler<'a> {
    db: &'a Database,
    prefix: String,
}

impl<'a> CommandHandler<'a> {
    pub fn new(db: &'a Database, prefix: impl Into<String>) -> Self {
        Self {
            db,
            prefix: prefix.into(),
        }
    }

    /// Handle raw message text.
    ///
    /// Returns `None` for messages that are not commands.
    pub fn handle_message(&self, text: &str, author: &str) -> Option<Vec<String>> {
        match Command::parse(text, &self.prefix) {
            Ok(command) => Some(self.execute(&command, author)),
            Err(ParseError::NotACommand) => None,
            Err(ParseError::Unknown(name)) => Some(vec![format!(
                "Unknown command: {}{}. Try {}help.",
                self.prefix, name, self.prefix
            )]),
            Err(ParseError::MissingArgument { usage, .. }) => {
                Some(vec![format!("Usage: {}{}", self.prefix, usage)])
            }
        }
    }

    /// Execute a parsed command on behalf of `author`.
    pub fn execute(&self, command: &Command, author: &str) -> Vec<String> {
        tracing::info!(?command, author, "Executing command");
        match command {
            Command::AddWebsite { url, description } => {
                vec![self.add_website(url, description.as_deref())]
            }
            Command::UpdateDescription { url, description } => {
                vec![self.update_description(url, description, author)]
            }
            Command::ListWebsites => self.list_websites(),
            Command::SiteInfo { url } => vec![self.site_info(url)],
            Command::Help => vec![self.help()],
        }
    }

    fn add_website(&self, url: &str, description: Option<&str>) -> String {
        let Some(description) = description else {
            return MISSING_DESCRIPTION_REPLY.to_string();
        };
        match self.db.create_website(url, description) {
            Ok(_) => ADDED_REPLY.to_string(),
            Err(Error::AlreadyExists(_)) => ALREADY_ADDED_REPLY.to_string(),
            Err(e) => store_failure(&e),
        }
    }

    fn update_description(&self, url: &str, description: &str, author: &str) -> String {
        let url = normalize_url(url);
        match self.db.describe_website(url, description, author) {
            Ok(_) => format!("Description for {url} has been updated!"),
            Err(Error::NotFound(_)) => format!("No record found for URL: {url}"),
            Err(e) => store_failure(&e),
        }
    }

    fn list_websites(&self) -> Vec<String> {
        match self.db.list_websites(WebsiteOrder::ReferenceCount) {
            Ok(records) => render_website_list(&records),
            Err(e) => vec![store_failure(&e)],
        }
    }

    fn site_info(&self, url: &str) -> String {
        let url = normalize_url(url);
        match self.db.get_website(url) {
            Ok(Some(record)) => render_site_info(&record),
            Ok(None) => format!("No information found for URL: {url}"),
            Err(e) => store_failure(&e),
        }
    }

    fn help(&self) -> String {
        let mut reply = String::from("Bot Commands Help\nList of commands available\n");
        for (usage, summary) in HELP_ENTRIES {
            reply.push_str(&format!("{}{} - {}\n", self.prefix, usage, summary));
        }
        reply
    }
}

fn store_failure(err: &Error) -> String {
    tracing::error!(error = %err, "Command failed on store error");
    STORE_FAILURE_REPLY.to_string()
}

/// Render the ranked catalog as one or two reply messages.
pub fn render_website_list(records: &[WebsiteRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec![EMPTY_LIST_REPLY.to_string()];
    }

    let mut response = String::from("Websites and Rankings:\n");
    for (rank, record) in records.iter().enumerate() {
        response.push_str(&format!(
            "{}. {} - Description: {} - Referenced: {} times\n",
            rank + 1,
            record.url,
            record.description.as_deref().unwrap_or("None"),
            record.reference_count
        ));
    }

    fit_to_transport(response)
}

/// Cut an oversized reply down, preceded by a notice message.
pub fn fit_to_transport(response: String) -> Vec<String> {
    if response.chars().count() <= MAX_MESSAGE_CHARS {
        return vec![response];
    }
    let mut truncated: String = response.chars().take(TRUNCATE_AT_CHARS).collect();
    truncated.push_str("...");
    vec![LIST_TOO_LONG_REPLY.to_string(), truncated]
}

/// Render every stored field of one website.
pub fn render_site_info(record: &WebsiteRecord) -> String {
    let updated_by = record
        .updated_by
        .as_ref()
        .map(|actor| actor.to_string())
        .unwrap_or_else(|| "None".to_string());

    format!(
        "Information for {}:\n\
         - Description: {}\n\
         - First Referenced: {}\n\
         - Last Referenced: {}\n\
         - Last Updated: {}\n\
         - Updated By: {}\n\
         - Total References: {} times\n",
        record.url,
        record.description.as_deref().unwrap_or("None"),
        record.first_referenced.format(TIMESTAMP_FORMAT),
        record.last_referenced.format(TIMESTAMP_FORMAT),
        record.last_updated.format(TIMESTAMP_FORMAT),
        updated_by,
        record.reference_count
    )
}
