use std::convert::Infallible;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Args, Parser, Subcommand};
use frames::{ContentType, Frame, FrameKind};
use pubsub_capture::config::DEFAULT_HUB;
use pubsub_capture::scenario::{self, DeliveryTarget, SentMessage};
use pubsub_capture::{
    AccessRequest, CaptureClient, CaptureConfig, CaptureError, CloseReason, ConfigError,
    PubSubService, ServiceClient, ServiceError, WaitError, run_or_timeout,
};
use serde_json::{Value, json};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("no end signal within {0:?}")]
    Timeout(Duration),
    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(
    name = "pubsub-capture",
    about = "Provision access URIs, inject messages and capture pub/sub websocket traffic"
)]
struct Cli {
    #[arg(long, env = "WEB_PUBSUB_CONNECTION_STRING", hide_env_values = true)]
    connection_string: Option<String>,

    #[arg(long, env = "WEB_PUBSUB_HUB", default_value = DEFAULT_HUB)]
    hub: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a client access URI.
    Url(UrlArgs),
    /// Inject one message.
    Send(SendArgs),
    /// Capture frames until the end signal, peer close or timeout.
    Listen(ListenArgs),
    /// Send the standard delivery sequence followed by the end signal.
    Sequence(SequenceArgs),
}

#[derive(Args, Debug)]
struct UrlArgs {
    #[arg(long = "group")]
    groups: Vec<String>,
    #[arg(long)]
    user: Option<String>,
    #[arg(long = "role")]
    roles: Vec<String>,
    #[arg(long)]
    ttl_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct SendArgs {
    #[arg(long)]
    group: Option<String>,
    #[arg(long, default_value = "text")]
    content_type: ContentType,
    /// Send the end-signal bytes instead of a payload.
    #[arg(long, conflicts_with_all = ["payload", "content_type"])]
    end_signal: bool,
    #[arg(required_unless_present = "end_signal")]
    payload: Option<String>,
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// Connect here instead of provisioning a URI.
    #[arg(long)]
    uri: Option<String>,
    #[arg(long = "group")]
    groups: Vec<String>,
    #[arg(long, env = "CAPTURE_SUBPROTOCOL")]
    subprotocol: Option<String>,
    #[arg(long, env = "CAPTURE_WAIT_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct SequenceArgs {
    #[arg(long)]
    group: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = CaptureConfig::from_env()?;
    config.connection_string = cli.connection_string;
    config.hub = cli.hub;

    match cli.command {
        Command::Url(args) => run_url(&config, args).await,
        Command::Send(args) => run_send(&config, args).await,
        Command::Listen(args) => run_listen(config, args).await,
        Command::Sequence(args) => run_sequence(&config, args).await,
    }
}

async fn run_url(config: &CaptureConfig, args: UrlArgs) -> Result<(), CliError> {
    let service = ServiceClient::from_config(config)?;
    let mut request = AccessRequest {
        user_id: args.user,
        roles: args.roles,
        groups: args.groups,
        ttl: None,
    };
    if let Some(secs) = args.ttl_secs {
        request = request.ttl(Duration::from_secs(secs));
    }
    println!("{}", service.client_access_uri(&request).await?);
    Ok(())
}

async fn run_send(config: &CaptureConfig, args: SendArgs) -> Result<(), CliError> {
    let service = ServiceClient::from_config(config)?;
    let message = if args.end_signal {
        SentMessage::end_signal()
    } else {
        SentMessage::new(args.payload.unwrap_or_default(), args.content_type)
    };
    let target = delivery_target(args.group);
    scenario::send_message(&service, &target, &message).await?;
    info!(
        hub = %config.hub,
        delivery = ?target,
        content_type = message.content_type.as_str(),
        bytes = message.payload.len(),
        "cli: message sent"
    );
    Ok(())
}

async fn run_sequence(config: &CaptureConfig, args: SequenceArgs) -> Result<(), CliError> {
    let service = ServiceClient::from_config(config)?;
    let target = delivery_target(args.group);
    let sent = scenario::send_delivery_sequence(&service, &target).await?;
    println!("sent {} messages and the end signal", sent.len());
    Ok(())
}

async fn run_listen(mut config: CaptureConfig, args: ListenArgs) -> Result<(), CliError> {
    if args.subprotocol.is_some() {
        config.subprotocol = args.subprotocol;
    }
    let end_signal = config.end_signal_for_groups(&args.groups)?;

    let uri = match args.uri {
        Some(uri) => uri,
        None => {
            let service = ServiceClient::from_config(&config)?;
            let request = AccessRequest {
                groups: args.groups,
                ..AccessRequest::default()
            };
            service.client_access_uri(&request).await?
        }
    };

    let client = CaptureClient::connect(&uri, end_signal, config.connect_options()).await?;
    let deadline = args.timeout_ms.map_or(config.wait_timeout, Duration::from_millis);
    let outcome: Result<CloseReason, WaitError<Infallible>> =
        run_or_timeout(deadline, || async { Ok(client.lifetime().await) }).await;
    if outcome.is_err() {
        warn!(?deadline, "cli: no end signal before deadline");
        client.stop().await;
    }

    for frame in client.frames() {
        println!("{}", serde_json::to_string(&frame_json(&frame))?);
    }
    eprintln!(
        "closed: {:?} ({} frames)",
        client.close_reason(),
        client.frame_count()
    );

    match outcome {
        Ok(_) => Ok(()),
        Err(_) => Err(CliError::Timeout(deadline)),
    }
}

fn delivery_target(group: Option<String>) -> DeliveryTarget {
    group.map_or(DeliveryTarget::All, DeliveryTarget::Group)
}

/// One JSON line per captured frame.
fn frame_json(frame: &Frame) -> Value {
    match frame.kind() {
        FrameKind::Text => json!({
            "kind": "text",
            "len": frame.len(),
            "text": frame.text_lossy(),
        }),
        FrameKind::Binary => json!({
            "kind": "binary",
            "len": frame.len(),
            "data": BASE64.encode(frame.payload()),
        }),
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
