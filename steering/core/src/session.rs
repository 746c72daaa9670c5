//! Conversation Session Interface
//!
//! The steering core does not talk to an agent itself. It hands each record
//! to a [`ConversationSession`], which owns the transport, the protocol, and
//! everything that happens after a prompt is accepted.
//!
//! # Design Philosophy
//!
//! Sessions are shared with the consumption task, so implementations must be
//! `Send + Sync`. The core waits for `send` to finish before pulling the next
//! record, and ignores what it returns beyond logging it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::messages::{Attachment, SessionId};

/// A prompt forwarded to the session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    /// Prompt text
    pub prompt: String,
    /// Attachments, absent when none were queued
    pub attachments: Option<Vec<Attachment>>,
}

impl SendRequest {
    /// Create a request without attachments
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            attachments: None,
        }
    }
}

/// Downstream conversation a [`ConversationManager`](crate::ConversationManager)
/// feeds
///
/// Implement this for whatever executes prompts: an agent subprocess, a
/// remote API, or a test double.
#[async_trait]
pub trait ConversationSession: Send + Sync {
    /// Identifier stamped on every message queued for this session
    fn session_id(&self) -> &SessionId;

    /// Deliver one prompt, returning the session's message ID
    ///
    /// An error affects only this prompt; the manager logs it and moves on.
    async fn send(&self, request: SendRequest) -> anyhow::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        id: SessionId,
        prompts: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConversationSession for Recorder {
        fn session_id(&self) -> &SessionId {
            &self.id
        }

        async fn send(&self, request: SendRequest) -> anyhow::Result<String> {
            let mut prompts = self.prompts.lock();
            prompts.push(request.prompt);
            Ok(format!("msg-{}", prompts.len()))
        }
    }

    #[tokio::test]
    async fn test_session_as_trait_object() {
        let session: Box<dyn ConversationSession> = Box::new(Recorder {
            id: "s-1".into(),
            prompts: parking_lot::Mutex::new(Vec::new()),
        });

        assert_eq!(session.session_id().as_str(), "s-1");
        let id = session.send(SendRequest::new("hi")).await.unwrap();
        assert_eq!(id, "msg-1");
    }

    #[test]
    fn test_send_request_serialization() {
        let request = SendRequest {
            prompt: "Check this file".into(),
            attachments: Some(vec![Attachment::file("/test/file.py")]),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "prompt": "Check this file",
                "attachments": [{"type": "file", "path": "/test/file.py"}]
            })
        );

        let none = serde_json::to_value(SendRequest::new("x")).unwrap();
        assert_eq!(none, serde_json::json!({"prompt": "x", "attachments": null}));
    }
}
