//! Core types for termfolio
//!
//! The wire shapes mirror what the terminal front end sends and expects:
//! a chat request is `{message, sessionId?}` and a successful reply is
//! `{reply, showProject, projectData}`. Conversation history is kept as an
//! ordered sequence of [`ChatTurn`]s per session.

use serde::{Deserialize, Serialize};

/// Who authored a turn in a conversation.
///
/// `System` never appears in stored history; it exists only in the outbound
/// prompt assembled for the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Successful chat response returned to the front end.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    /// Visible reply text, with any directive tags stripped
    pub reply: String,
    /// Project key extracted from the reply, if the model emitted one
    pub show_project: Option<String>,
    /// Project record for `show_project`, null when unknown or absent
    pub project_data: Option<serde_json::Value>,
}

/// Outcome of a rate-limit admission check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured requests-per-window ceiling
    pub limit: u32,
    /// Requests left in the current window (0 when denied)
    pub remaining: u32,
    /// Seconds until the caller should retry (window remainder when
    /// admitted, block/window remainder when denied)
    pub retry_after_secs: u64,
}
