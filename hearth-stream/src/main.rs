//! hearth-stream - Read, page through and follow a Hearth stream

use anyhow::{Context, Result};
use clap::Parser;
use libhearth::live::LiveEvent;
use libhearth::logging::{LogFormat, LoggingConfig};
use libhearth::notify::NotificationReceiver;
use libhearth::{Action, Content, HearthClient, HearthError, Store, StreamDescriptor, StreamName};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "hearth-stream")]
#[command(version, about = "Read, page through and follow a Hearth stream")]
#[command(long_about = r#"Read, page through and follow a Hearth stream.

EXAMPLES:
    # First page of the configured default stream
    hearth-stream

    # Three pages of the followed stream
    hearth-stream followed --pages 3

    # A tag, a profile or a single content with its replies
    hearth-stream tag --tag rust
    hearth-stream profile-all --profile 42
    hearth-stream --content 1234

    # Follow live updates, press Enter to show new content
    hearth-stream public --follow

    # JSON lines for scripting
    hearth-stream local --format jsonl | jq -r '.id'

OUTPUT FORMATS:
    text  - Human-readable summary (default)
    json  - JSON array of contents
    jsonl - One JSON object per line (streaming-friendly)

EXIT CODES:
    0 - Success
    1 - Server, network or configuration error
    2 - Not authenticated
    3 - Invalid input
"#)]
struct Cli {
    /// Stream to read (public, followed, local, tag, profile-all, profile-pinned, content)
    stream: Option<String>,

    /// Tag name for the tag stream
    #[arg(long, value_name = "NAME")]
    tag: Option<String>,

    /// Profile id for the profile streams
    #[arg(long, value_name = "ID")]
    profile: Option<String>,

    /// Content id for the single content view
    #[arg(long, value_name = "ID")]
    content: Option<String>,

    /// Number of pages to load
    #[arg(short, long, default_value = "1", value_name = "N")]
    pages: usize,

    /// Keep running and follow live updates
    #[arg(long)]
    follow: bool,

    /// Output format (text, json or jsonl)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Log format (text, json or pretty)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    Jsonl,
}

impl std::str::FromStr for OutputFormat {
    type Err = HearthError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "jsonl" => Ok(Self::Jsonl),
            _ => Err(HearthError::InvalidInput(format!(
                "Invalid format '{}'. Valid formats: text, json, jsonl",
                s
            ))),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(3);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<HearthError>()
            .map(HearthError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn init_logging(cli: &Cli) -> std::result::Result<(), String> {
    let mut logging = LoggingConfig::from_env("warn", cli.verbose);
    if let Some(format) = &cli.log_format {
        logging.format = format.parse::<LogFormat>()?;
    }
    logging.init();
    Ok(())
}

/// Stream named on the command line, if any
fn resolve_stream(cli: &Cli) -> libhearth::Result<Option<StreamDescriptor>> {
    let name = match &cli.stream {
        Some(name) => name
            .parse::<StreamName>()
            .map_err(HearthError::InvalidInput)?,
        None if cli.content.is_some() => StreamName::Content,
        None if cli.tag.is_some() => StreamName::Tag,
        None if cli.profile.is_some() => StreamName::ProfileAll,
        None => return Ok(None),
    };

    let scope = match name {
        StreamName::Tag => cli.tag.clone(),
        StreamName::ProfileAll | StreamName::ProfilePinned => cli.profile.clone(),
        StreamName::Content => cli.content.clone(),
        StreamName::Public | StreamName::Followed | StreamName::Local => None,
    };

    StreamDescriptor::new(name, scope).map(Some)
}

async fn run(cli: Cli) -> Result<()> {
    // Argument errors come before any configuration is read
    let format: OutputFormat = cli.format.parse()?;
    let requested = resolve_stream(&cli)?;
    if cli.pages == 0 {
        return Err(HearthError::InvalidInput("--pages must be at least 1".to_string()).into());
    }

    let client = HearthClient::new()?;
    let stream = match requested {
        Some(stream) => stream,
        None => client.default_stream()?,
    };
    debug!(stream = %stream, pages = cli.pages, "reading stream");

    let mut store = client.store(stream.clone());
    store.dispatch(Action::FetchStream).await?;
    for _ in 1..cli.pages {
        if store.state().load_more_marker().is_none() {
            break;
        }
        store.dispatch(Action::LoadMore).await?;
    }

    print_contents(format, &store.state().current_contents())?;

    if cli.follow {
        follow(&client, &mut store, &stream, format).await?;
    }

    Ok(())
}

/// Follow live updates until stdin closes or a shutdown signal arrives
async fn follow(
    client: &HearthClient,
    store: &mut Store,
    stream: &StreamDescriptor,
    format: OutputFormat,
) -> Result<()> {
    tokio::spawn(print_notifications(client.subscribe()));

    let (live, mut events) = client.live_channel(stream)?.spawn();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    info!(stream = %stream, "following live updates");

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("shutdown requested");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match &event {
                    LiveEvent::Connected => info!("live channel connected"),
                    LiveEvent::Disconnected => warn!("live channel disconnected"),
                    _ => {}
                }

                let before = store.state().new_content_count();
                if let Some(action) = event.into_action() {
                    // Failures are already reported as notifications
                    if let Err(e) = store.dispatch(action).await {
                        debug!(error = %e, "live action failed");
                    }
                }
                let after = store.state().new_content_count();
                if after > before && format == OutputFormat::Text {
                    eprintln!("{} new item(s), press Enter to show", after);
                }
            }
            line = input.next_line(), if input_open => {
                match line.context("Failed to read stdin")? {
                    Some(_) => {
                        let summary = store.acknowledge_new_content().await?;
                        let merged: Vec<&Content> = summary
                            .merged
                            .iter()
                            .filter_map(|id| store.state().content(id))
                            .collect();
                        print_contents(format, &merged)?;
                    }
                    None => {
                        debug!("stdin closed, acknowledging is no longer possible");
                        input_open = false;
                    }
                }
            }
        }
    }

    live.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use futures::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;
    let handle = signals.handle();
    if let Some(signal) = signals.next().await {
        debug!(signal, "received signal");
    }
    handle.close();
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Signal setup failed")
}

async fn print_notifications(mut notifications: NotificationReceiver) {
    loop {
        match notifications.recv().await {
            Ok(notification) => eprintln!("{}", notification),
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "notifications dropped"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_contents(format: OutputFormat, contents: &[&Content]) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(contents)?);
        }
        OutputFormat::Jsonl => {
            for content in contents {
                println!("{}", serde_json::to_string(content)?);
            }
        }
        OutputFormat::Text => {
            for content in contents {
                println!("{}", summary_line(content));
                if content.reply_count > 0 || content.shares_count > 0 {
                    println!(
                        "  {} replies, {} shares",
                        content.reply_count, content.shares_count
                    );
                }
            }
        }
    }
    Ok(())
}

fn summary_line(content: &Content) -> String {
    let body = content.text.as_deref().unwrap_or(&content.rendered);
    let body = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let preview = if body.chars().count() > 60 {
        format!("{}...", body.chars().take(60).collect::<String>())
    } else {
        body
    };

    format!(
        "{} | {} | {} | {}",
        content.timestamp.format("%Y-%m-%d %H:%M"),
        content.id,
        content.author.display_name(),
        preview
    )
}
