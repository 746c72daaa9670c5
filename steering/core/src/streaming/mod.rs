//! Streaming Input for Conversation Sessions
//!
//! Bridges the steering queue to the session: [`StreamingInput`] pulls items
//! from a [`MessageQueue`](crate::queue::MessageQueue) one at a time and turns
//! each message into a normalized [`UserRecord`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   get()   ┌────────────────┐  UserRecord  ┌──────────────┐
//! │ MessageQueue │ ────────▶ │ StreamingInput │ ───────────▶ │   consumer   │
//! └──────────────┘           └────────────────┘              └──────────────┘
//!                                   │
//!                          SHUTDOWN │ ends the sequence
//!                                   ▼
//!                                 None
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use steering_core::queue::MessageQueue;
//! use steering_core::streaming::StreamingInput;
//!
//! let queue = Arc::new(MessageQueue::new(100));
//! let mut input = StreamingInput::new(Arc::clone(&queue));
//!
//! while let Some(record) = input.next_record().await {
//!     println!("{}", record.content());
//! }
//! ```

mod input;
mod record;

pub use input::StreamingInput;
pub use record::{MessageRole, RecordMessage, RecordType, UserRecord};
