//! Steering Core - Prioritized Message Queuing for Agent Conversations
//!
//! This crate lets any number of callers queue prompts for one long-lived
//! conversation session without waiting for the session to finish earlier
//! prompts. Prompts are served strictly by priority, first-come first-served
//! within a priority, one at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐ ┌──────────┐ ┌──────────┐
//! │ caller A │ │ caller B │ │ caller C │      queue_message() never waits
//! └────┬─────┘ └────┬─────┘ └────┬─────┘
//!      └────────────┼────────────┘
//!                   ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    ConversationManager                           │
//! │  ┌───────────────────────┐    ┌────────────────┐                 │
//! │  │ MessageQueue          │───▶│ StreamingInput │──┐              │
//! │  │ (bounded, priority)   │    └────────────────┘  │ consumption  │
//! │  └───────────────────────┘                        │ task         │
//! └───────────────────────────────────────────────────┼──────────────┘
//!                                                     ▼
//!                                        ConversationSession::send()
//! ```
//!
//! # Key Types
//!
//! - [`ConversationManager`]: queues prompts and drives the consumption task
//! - [`MessageQueue`]: the bounded priority queue with in-band shutdown
//! - [`StreamingInput`]: turns queue items into [`UserRecord`]s
//! - [`ConversationSession`]: the downstream collaborator prompts go to
//! - [`Priority`]: `Low < Normal < High < Urgent`
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use steering_core::{ConversationManager, Priority, QueueOptions};
//!
//! let manager = ConversationManager::new(Arc::new(session));
//!
//! manager.queue_message("What is Rust?", Priority::Normal)?;
//! manager.queue_message("URGENT: fix the bug", Priority::Urgent)?;
//! manager.queue_message(
//!     "Review this",
//!     QueueOptions::new().with_attachments(vec![Attachment::file("src/lib.rs")]),
//! )?;
//!
//! // Urgent goes first; stop() returns once everything queued was sent
//! manager.stop(None).await;
//! ```
//!
//! # Module Overview
//!
//! - [`config`]: TOML and environment configuration
//! - [`conversation`]: the conversation manager and its lifecycle
//! - [`error`]: error types
//! - [`messages`]: queued messages, identifiers, attachments
//! - [`priority`]: priority levels
//! - [`queue`]: bounded priority queue, ordering, and sequencing
//! - [`session`]: the session interface
//! - [`streaming`]: the queue-to-record adapter

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod conversation;
pub mod error;
pub mod messages;
pub mod priority;
pub mod queue;
pub mod session;
pub mod streaming;

// Re-exports for convenience
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigSource,
    SteeringConfig, SteeringToml,
};
pub use conversation::{ConversationManager, ManagerState, ManagerStats, QueueOptions};
pub use error::{Result, SteeringError};
pub use messages::{Attachment, AttachmentKind, Metadata, QueuedMessage, RequestId, SessionId};
pub use priority::{ParsePriorityError, Priority};
pub use queue::{MessageQueue, QueueItem};
pub use session::{ConversationSession, SendRequest};
pub use streaming::{StreamingInput, UserRecord};
