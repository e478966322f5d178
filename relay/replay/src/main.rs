//! Relay Replay - drive the stream reader and registry from the command line
//!
//! Feeds a captured transcript, a built-in mock script, or a live server
//! stream through a [`StreamReader`] into a [`StreamRegistry`] and prints the
//! assembled result as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Replay a captured `data: <json>` transcript in 16-byte chunks
//! relay-replay --file capture.sse --chunk-size 16
//!
//! # Run the built-in agent script and print the whole state
//! relay-replay --mock agent --state
//!
//! # Stream from a live server (Ctrl-C requests a stop for agent streams)
//! relay-replay --live --agent --url http://localhost:8000 \
//!     --payload '{"message": "hello"}'
//!
//! # Verbose logging
//! RUST_LOG=relay_core=debug relay-replay --mock normal
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use relay_core::mock::{self, MockOptions};
use relay_core::{
    load_config, load_config_from_path, ActiveConversationCell, ConfigOverrides, ConversationId,
    ReadOutcome, RegistrySink, RelayConfig, ResponseBody, StreamClient, StreamKind, StreamReader,
    StreamRegistry, StreamTokens,
};

/// Relay Replay - run chat/agent streams through the relay stream registry
#[derive(Parser, Debug)]
#[command(name = "relay-replay")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "mock", "live"])))]
pub struct Args {
    /// Captured SSE transcript to replay
    #[arg(short = 'f', long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Built-in mock script to run
    #[arg(short = 'm', long, value_enum)]
    mock: Option<MockKind>,

    /// Stream from the configured server
    #[arg(long)]
    live: bool,

    /// Server base URL (live mode)
    #[arg(short = 'u', long, value_name = "URL")]
    url: Option<String>,

    /// Use the agent endpoint instead of the chat endpoint
    #[arg(short = 'a', long)]
    agent: bool,

    /// JSON request body (live mode)
    #[arg(short = 'p', long, value_name = "JSON", default_value = r#"{"message": "Hello"}"#)]
    payload: String,

    /// Conversation identifier (generated when absent)
    #[arg(long, value_name = "ID")]
    conversation: Option<String>,

    /// Chunk size used to cut file and mock bodies
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Include web search events in the normal mock script
    #[arg(long)]
    web_search: bool,

    /// Stop the mock script after this many events
    #[arg(long, value_name = "N")]
    stop_after: Option<usize>,

    /// Keep reading even if the active conversation changes
    #[arg(long)]
    background: bool,

    /// Configuration file path
    #[arg(short = 'c', long, env = "RELAY_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the full stream state instead of the projection
    #[arg(long)]
    state: bool,
}

/// Built-in mock scripts
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MockKind {
    /// Chat response with thinking
    Normal,
    /// Agent session with a tool call and surface content
    Agent,
    /// Response that reports an error
    Error,
}

/// Initialize logging to stderr so stdout stays machine-readable
fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("{default_filter},relay_replay=info"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn load_relay_config(args: &Args) -> Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => load_config_from_path(Some(path.clone()))?,
        None => load_config()?,
    };

    let mut overrides = ConfigOverrides::new();
    if let Some(ref url) = args.url {
        overrides = overrides.with_base_url(url.clone());
    }
    if args.background {
        overrides = overrides.with_cancel_on_conversation_switch(false);
    }
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

async fn read_transcript(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read transcript: {}", path.display()))
}

fn stream_kind(args: &Args) -> StreamKind {
    if args.agent || args.mock == Some(MockKind::Agent) {
        StreamKind::Agent
    } else {
        StreamKind::Normal
    }
}

fn mock_bytes(kind: MockKind, args: &Args) -> Vec<u8> {
    let options = MockOptions {
        web_search: args.web_search,
        stop_after: args.stop_after,
        ..MockOptions::default()
    };
    let events = match kind {
        MockKind::Normal => mock::normal_script(&options, 0),
        MockKind::Agent => mock::agent_script(&options),
        MockKind::Error => mock::error_script("Mock error for testing"),
    };
    mock::to_sse(&events)
}

fn outcome_name(outcome: ReadOutcome) -> &'static str {
    match outcome {
        ReadOutcome::Completed => "completed",
        ReadOutcome::Failed => "failed",
        ReadOutcome::Cancelled => "cancelled",
    }
}

async fn run(args: Args) -> Result<Value> {
    let config = load_relay_config(&args)?;
    init_logging(&config.log_filter);
    info!(source = %config.source(), "Configuration loaded");

    let conversation_id = args
        .conversation
        .clone()
        .map_or_else(ConversationId::generate, ConversationId::from);
    let kind = stream_kind(&args);

    let registry = StreamRegistry::new();
    let tokens = StreamTokens::new();
    let active = ActiveConversationCell::with_active(conversation_id.clone());
    let reader = StreamReader::with_config(Arc::new(active), config.reader.clone());

    registry.start(conversation_id.clone(), kind, 0);
    let _subscription = registry.subscribe(&conversation_id, |update, state| {
        debug!(
            update_type = update.update_type(),
            blocks = state.content_blocks.len(),
            "Stream update"
        );
    });

    let mut sink = RegistrySink::new(registry.clone(), conversation_id.clone());
    let token = tokens.issue();

    let outcome = if args.live {
        let payload: Value =
            serde_json::from_str(&args.payload).context("--payload is not valid JSON")?;
        let client = StreamClient::from_config(&config)?;
        let mut body = client.open(kind, &payload).await?;

        let finished = tokio::select! {
            outcome = reader.process(&mut body, &mut sink, token, &conversation_id) => {
                Some(outcome)
            }
            _ = tokio::signal::ctrl_c() => None,
        };

        match finished {
            Some(outcome) => outcome,
            None => {
                warn!("Interrupted");
                body.cancel().await;
                if kind.is_stoppable() {
                    match client.request_stop(&conversation_id).await {
                        Ok(stopped) => info!(stopped, "Stop request sent"),
                        Err(e) => warn!(error = %e, "Stop request failed"),
                    }
                }
                ReadOutcome::Cancelled
            }
        }
    } else {
        let bytes = match (&args.file, args.mock) {
            (Some(path), _) => read_transcript(path).await?,
            (None, Some(mock_kind)) => mock_bytes(mock_kind, &args),
            (None, None) => anyhow::bail!("one of --file, --mock or --live is required"),
        };
        let body = mock::chunked_body(&bytes, args.chunk_size);
        reader.process(body, &mut sink, token, &conversation_id).await
    };

    let state = registry
        .get(&conversation_id)
        .context("stream state disappeared")?;
    info!(
        outcome = outcome_name(outcome),
        blocks = state.content_blocks.len(),
        complete = state.is_complete,
        "Replay finished"
    );

    if args.state {
        return Ok(serde_json::to_value(&state)?);
    }

    Ok(json!({
        "conversation_id": conversation_id,
        "outcome": outcome_name(outcome),
        "status": registry.status(&conversation_id),
        "error": state.error,
        "message_content": state.message_content(),
        "blocks": state.project(),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let report = run(args).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
