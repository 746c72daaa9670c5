//! Steering Console
//!
//! Interactive front end for a [`ConversationManager`]. Each line read from
//! stdin is queued as a prompt for a simulated session that takes a while to
//! answer, so queued prompts visibly overtake each other by priority.
//!
//! # Usage
//!
//! ```bash
//! # Start with the default config ($XDG_CONFIG_HOME/steering/steering.toml)
//! steering-console
//!
//! # Smaller queue, verbose logging
//! STEERING_MAX_QUEUE_DEPTH=4 RUST_LOG=debug steering-console
//! ```
//!
//! # Input
//!
//! - `!text`: queue with URGENT priority
//! - `+text`: queue with HIGH priority
//! - `-text`: queue with LOW priority
//! - `text`: queue with NORMAL priority
//! - `/clear`: discard prompts still waiting
//! - `/quit` or EOF: drain the queue and exit
//!
//! # Environment Variables
//!
//! - `STEERING_MAX_QUEUE_DEPTH`: queue capacity
//! - `STEERING_STOP_TIMEOUT_MS`: drain timeout on exit (0 = wait forever)
//! - `STEERING_CONSOLE_LATENCY_MS`: simulated session latency (default: 1500)
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

use steering_core::{
    load_config, ConversationManager, ConversationSession, Priority, SendRequest, SessionId,
};

const DEFAULT_LATENCY_MS: u64 = 1500;

/// Session that logs each prompt after a fixed delay
struct ConsoleSession {
    id: SessionId,
    latency: Duration,
    answered: AtomicU64,
}

#[async_trait]
impl ConversationSession for ConsoleSession {
    fn session_id(&self) -> &SessionId {
        &self.id
    }

    async fn send(&self, request: SendRequest) -> anyhow::Result<String> {
        tokio::time::sleep(self.latency).await;
        let n = self.answered.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            prompt = %request.prompt,
            attachments = request.attachments.map_or(0, |a| a.len()),
            "Session handled prompt"
        );
        Ok(format!("console-{n}"))
    }
}

/// Split an input line into its priority and prompt text
fn parse_line(line: &str) -> (Priority, &str) {
    match line.chars().next() {
        Some('!') => (Priority::Urgent, line[1..].trim_start()),
        Some('+') => (Priority::High, line[1..].trim_start()),
        Some('-') => (Priority::Low, line[1..].trim_start()),
        _ => (Priority::Normal, line),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("steering_console=info".parse()?)
                .add_directive("steering_core=info".parse()?),
        )
        .with_target(true)
        .init();

    let config = load_config()?;
    info!(
        source = %config.source(),
        max_queue_depth = config.max_queue_depth,
        "Configuration loaded"
    );

    let latency = std::env::var("STEERING_CONSOLE_LATENCY_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LATENCY_MS);

    let session = Arc::new(ConsoleSession {
        id: SessionId::new(),
        latency: Duration::from_millis(latency),
        answered: AtomicU64::new(0),
    });
    let manager = ConversationManager::with_config(session, config);
    manager.start()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                None
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" => break,
            "/clear" => {
                let cleared = manager.clear_queue();
                info!(cleared, "Queue cleared");
                continue;
            }
            _ => {}
        }

        let (priority, prompt) = parse_line(line);
        match manager.queue_message(prompt, priority) {
            Ok(request_id) => info!(
                request_id = %request_id,
                priority = %priority,
                queued = manager.queue_size(),
                "Prompt queued"
            ),
            Err(e) if e.is_queue_full() => warn!(error = %e, "Prompt dropped, try again shortly"),
            Err(e) => return Err(e.into()),
        }
    }

    info!(pending = manager.queue_size(), "Draining queue");
    manager.shutdown().await;

    let stats = manager.stats();
    info!(
        sent = stats.sent,
        failed = stats.failed,
        rejected = stats.rejected,
        cleared = stats.cleared,
        "Steering console stopped"
    );
    Ok(())
}
