//! hearth-post - Publish posts, replies and edits to a Hearth server

use anyhow::{Context, Result};
use clap::Parser;
use libhearth::logging::LoggingConfig;
use libhearth::publisher::{FieldError, PublishForm, PublishOutcome};
use libhearth::{HearthClient, HearthError, Visibility};
use serde_json::json;
use std::io::{IsTerminal, Read};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "hearth-post")]
#[command(version, about = "Publish posts, replies and edits to a Hearth server")]
#[command(long_about = r#"Publish posts, replies and edits to a Hearth server.

EXAMPLES:
    # Publish a public post
    hearth-post "Hello from the terminal"

    # Read the text from stdin
    echo "Piped post" | hearth-post

    # Reply, or edit something you wrote
    hearth-post --reply-to 1234 "Good point"
    hearth-post --edit 1235 "Good point, fixed"

    # Limited visibility needs recipients
    hearth-post --visibility limited --recipients bob@social.example "Just for you"

EXIT CODES:
    0 - Published
    1 - Server, network or configuration error
    2 - Not authenticated
    3 - Invalid input (including fields the server rejected)
"#)]
struct Cli {
    /// Text to publish (reads from stdin if not provided)
    content: Option<String>,

    /// Visibility (public, limited, site or self)
    #[arg(long, default_value = "public")]
    visibility: String,

    /// Pin to your profile
    #[arg(long)]
    pinned: bool,

    /// Keep the content on this server
    #[arg(long)]
    no_federate: bool,

    /// Do not render link previews
    #[arg(long)]
    no_preview: bool,

    /// Recipients for limited visibility (comma-separated handles)
    #[arg(long, value_delimiter = ',', value_name = "HANDLES")]
    recipients: Vec<String>,

    /// Reply to this content
    #[arg(long, value_name = "ID", conflicts_with = "edit")]
    reply_to: Option<String>,

    /// Edit this content instead of creating a new one
    #[arg(long, value_name = "ID")]
    edit: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env("warn", cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<HearthError>()
            .map(HearthError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.format != "text" && cli.format != "json" {
        return Err(HearthError::InvalidInput(format!(
            "Invalid format '{}'. Valid formats: text, json",
            cli.format
        ))
        .into());
    }

    let text = match &cli.content {
        Some(text) => text.clone(),
        None => read_stdin()?,
    };
    let form = build_form(&cli, text)?;

    // Reject obviously invalid input before touching the configuration
    let errors = form.validate();
    if !errors.is_empty() {
        return Err(rejected(&errors).into());
    }

    let client = HearthClient::new()?;
    debug!(server = %client.config().server.base_url(), "publishing");

    match client.publisher().publish(&form).await? {
        PublishOutcome::Published { content, url } => {
            if cli.format == "json" {
                let output = json!({
                    "id": content.id,
                    "url": url,
                    "visibility": content.visibility,
                    "parent": content.parent,
                    "edited": form.edit.is_some(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", url);
            }
            Ok(())
        }
        PublishOutcome::Rejected(errors) => Err(rejected(&errors).into()),
    }
}

fn read_stdin() -> Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(HearthError::InvalidInput(
            "No content provided. Pass it as an argument or pipe it on stdin".to_string(),
        )
        .into());
    }

    let mut text = String::new();
    stdin
        .read_to_string(&mut text)
        .context("Failed to read content from stdin")?;
    Ok(text)
}

fn build_form(cli: &Cli, text: String) -> libhearth::Result<PublishForm> {
    let visibility: Visibility = cli
        .visibility
        .parse()
        .map_err(HearthError::InvalidInput)?;

    Ok(PublishForm {
        text: text.trim_end().to_string(),
        visibility,
        pinned: cli.pinned,
        federate: !cli.no_federate,
        show_preview: !cli.no_preview,
        recipients: cli.recipients.clone(),
        parent: cli.reply_to.clone(),
        edit: cli.edit.clone(),
    })
}

fn rejected(errors: &[FieldError]) -> HearthError {
    let details: Vec<String> = errors.iter().map(FieldError::to_string).collect();
    HearthError::InvalidInput(details.join("; "))
}
