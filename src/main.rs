//! Bulldozer command-line client
//!
//! Entry point for talking to the research backend from a terminal.

use std::io::Write;

use anyhow::Context;
use bulldozer_client::{
    ChatSession, Client, StreamUpdate,
    config::{AppConfig, Cli, LogFormat},
    types::{ChatOptions, ResearchRequest},
};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "bulldozer", author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    global: Cli,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a chat message and print the reply
    Chat {
        /// Message text
        message: String,

        /// Ask for extended reasoning
        #[arg(long)]
        deep_thinking: bool,

        /// Skip the background investigation
        #[arg(long)]
        no_background_investigation: bool,

        /// Report style, e.g. COMPREHENSIVE or investigator
        #[arg(long)]
        report_style: Option<String>,

        /// Wait for the whole reply instead of printing it as it arrives
        #[arg(long)]
        no_stream: bool,
    },
    /// Research reports
    Research {
        #[command(subcommand)]
        action: ResearchCommand,
    },
    /// Show the backend's model and feature configuration
    Config,
}

#[derive(Subcommand, Debug)]
enum ResearchCommand {
    /// Fetch a report by id
    Get {
        id: String,
    },
    /// Start a new research job
    Create {
        /// What to investigate
        #[arg(long)]
        query: String,

        /// Company under investigation
        #[arg(long)]
        company: Option<String>,

        /// Focus area (repeatable)
        #[arg(long = "focus")]
        focus_areas: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let args = Args::parse();
    let config = AppConfig::from_cli(&args.global).context("failed to load configuration")?;

    init_tracing(config.logging.format);

    info!(
        name: "client.config.loaded",
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        "Client configuration loaded"
    );

    let client = Client::from_config(&config.api)?;

    match args.command {
        Command::Chat {
            message,
            deep_thinking,
            no_background_investigation,
            report_style,
            no_stream,
        } => {
            let mut options = config.chat.clone();
            apply_chat_flags(
                &mut options,
                deep_thinking,
                no_background_investigation,
                report_style,
            );
            run_chat(&client, &message, &options, !no_stream).await?;
        }
        Command::Research { action } => match action {
            ResearchCommand::Get { id } => {
                let report = client.research().get(&id).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            ResearchCommand::Create {
                query,
                company,
                focus_areas,
            } => {
                let req = ResearchRequest {
                    query,
                    company,
                    focus_areas,
                };
                let report = client.research().create(&req).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        },
        Command::Config => {
            let cfg = client.configuration().get().await?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    // Results go to stdout; logs stay on stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
    }
}

fn apply_chat_flags(
    options: &mut ChatOptions,
    deep_thinking: bool,
    no_background_investigation: bool,
    report_style: Option<String>,
) {
    if deep_thinking {
        options.enable_deep_thinking = true;
    }
    if no_background_investigation {
        options.enable_background_investigation = false;
    }
    if let Some(style) = report_style {
        options.report_style = style;
    }
}

async fn run_chat(
    client: &Client,
    message: &str,
    options: &ChatOptions,
    stream: bool,
) -> anyhow::Result<()> {
    let session = ChatSession::new();

    let reply = if stream {
        let reply = session
            .send_streaming(client, message, options, |update| {
                if let StreamUpdate::Delta(text) = update {
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                }
            })
            .await?;
        println!();
        reply
    } else {
        let reply = session.send(client, message, options).await?;
        if let Some(msg) = &reply {
            println!("{}", msg.content);
        }
        reply
    };

    match reply.and_then(|msg| msg.research_id) {
        Some(id) => match session.open_research(client, &id).await {
            Ok(report) => eprintln!("research {id}: {}\n{}", report.title, report.summary),
            // Not ready yet; the id still lets the user fetch it later.
            Err(_) => eprintln!("research: {id}  (bulldozer research get {id})"),
        },
        None if session.message_count() == 0 => eprintln!("nothing to send"),
        None => {}
    }
    Ok(())
}
