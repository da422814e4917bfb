//! Chat orchestration
//!
//! Ties the validated request to the completion service: assemble the
//! persona prompt plus trimmed history, call the service, record the turn,
//! and post-process the reply for embedded show-project directives.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::knowledge;
use crate::llm::Completion;
use crate::session::SessionStore;
use crate::types::{ChatReply, ChatTurn};
use crate::validate::Sanitized;

/// Grammar of an embedded directive: `[SHOW_PROJECT:<word-chars>]`.
static DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[SHOW_PROJECT:(\w+)\]").expect("directive pattern is valid"));

/// Extract the show-project directive from a raw model reply.
///
/// Returns the visible text (every directive occurrence stripped, ends
/// trimmed) and the key of the first directive if one was present. Only the
/// first match is acted on even when a reply carries several tags; all of
/// them are removed from the visible text.
pub fn extract_directive(reply: &str) -> (String, Option<String>) {
    let key = DIRECTIVE
        .captures(reply)
        .map(|captures| captures[1].to_string());
    let visible = DIRECTIVE.replace_all(reply, "").trim().to_string();
    (visible, key)
}

/// Request handler for one chat turn, built once at startup with its
/// collaborators injected.
pub struct ChatOrchestrator {
    sessions: Arc<SessionStore>,
    completion: Arc<dyn Completion>,
    history_window: usize,
}

impl ChatOrchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        completion: Arc<dyn Completion>,
        history_window: usize,
    ) -> Self {
        Self {
            sessions,
            completion,
            history_window,
        }
    }

    /// Run one chat turn for an already-validated request.
    ///
    /// On success the session gains exactly two history entries (user, then
    /// raw assistant reply) and the returned payload carries the cleaned
    /// reply plus any resolved project record.
    pub async fn handle(&self, request: &Sanitized) -> Result<ChatReply> {
        let mut messages = vec![ChatTurn::system(knowledge::system_prompt())];
        messages.extend(
            self.sessions
                .recent(&request.session_id, self.history_window),
        );
        messages.push(ChatTurn::user(request.message.clone()));

        let raw_reply = self.completion.complete(&messages).await?;

        self.sessions.append_turn(
            &request.session_id,
            request.message.clone(),
            raw_reply.clone(),
        );

        let (reply, show_project) = extract_directive(&raw_reply);
        let project_data = show_project.as_deref().and_then(knowledge::project_data);

        if let Some(key) = &show_project {
            tracing::debug!(project = %key, session = %request.session_id, "Directive extracted");
        }

        Ok(ChatReply {
            reply,
            show_project,
            project_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::Role;
    use async_trait::async_trait;
    use std::time::Duration;

    struct ScriptedCompletion {
        reply: String,
    }

    #[async_trait]
    impl Completion for ScriptedCompletion {
        async fn complete(&self, _messages: &[ChatTurn]) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    struct FailingCompletion;

    #[async_trait]
    impl Completion for FailingCompletion {
        async fn complete(&self, _messages: &[ChatTurn]) -> Result<String> {
            Err(Error::ProviderOverloaded("scripted failure".to_string()))
        }
    }

    /// Captures the outbound prompt for inspection.
    struct RecordingCompletion {
        seen: parking_lot::Mutex<Vec<ChatTurn>>,
    }

    #[async_trait]
    impl Completion for RecordingCompletion {
        async fn complete(&self, messages: &[ChatTurn]) -> Result<String> {
            *self.seen.lock() = messages.to_vec();
            Ok("ok".to_string())
        }
    }

    fn sessions() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(Duration::from_secs(1800), 100))
    }

    fn request(message: &str) -> Sanitized {
        Sanitized {
            message: message.to_string(),
            session_id: "abc".to_string(),
        }
    }

    #[test]
    fn test_extract_directive_round_trip() {
        let (reply, key) =
            extract_directive("Check this out [SHOW_PROJECT:towercaster] cool right?");
        assert_eq!(key.as_deref(), Some("towercaster"));
        assert_eq!(reply, "Check this out  cool right?");
    }

    #[test]
    fn test_extract_directive_absent() {
        let (reply, key) = extract_directive("Just a plain reply.");
        assert!(key.is_none());
        assert_eq!(reply, "Just a plain reply.");
    }

    #[test]
    fn test_extract_directive_first_match_wins_all_stripped() {
        let (reply, key) =
            extract_directive("[SHOW_PROJECT:bookspire] or maybe [SHOW_PROJECT:thesis]");
        assert_eq!(key.as_deref(), Some("bookspire"));
        assert!(!reply.contains("SHOW_PROJECT"));
        assert_eq!(reply, "or maybe");
    }

    #[test]
    fn test_extract_directive_trims_edges() {
        let (reply, key) = extract_directive("Want to see it? [SHOW_PROJECT:towercaster]");
        assert_eq!(key.as_deref(), Some("towercaster"));
        assert_eq!(reply, "Want to see it?");
    }

    #[tokio::test]
    async fn test_turn_appends_user_then_assistant() {
        let store = sessions();
        let orchestrator = ChatOrchestrator::new(
            store.clone(),
            Arc::new(ScriptedCompletion {
                reply: "hello there".to_string(),
            }),
            10,
        );

        let reply = orchestrator.handle(&request("hi")).await.unwrap();
        assert_eq!(reply.reply, "hello there");
        assert!(reply.show_project.is_none());
        assert!(reply.project_data.is_none());

        assert_eq!(store.history_len("abc"), 2);
        let turns = store.recent("abc", 10);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "hi");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "hello there");
    }

    #[tokio::test]
    async fn test_directive_resolves_project_data() {
        let store = sessions();
        let orchestrator = ChatOrchestrator::new(
            store.clone(),
            Arc::new(ScriptedCompletion {
                reply: "Want to see it? [SHOW_PROJECT:towercaster]".to_string(),
            }),
            10,
        );

        let reply = orchestrator.handle(&request("show me")).await.unwrap();
        assert_eq!(reply.show_project.as_deref(), Some("towercaster"));
        assert_eq!(reply.reply, "Want to see it?");
        assert_eq!(reply.project_data.unwrap()["name"], "TOWERCASTER");

        // The stored assistant turn keeps the raw reply, tag included
        let turns = store.recent("abc", 10);
        assert!(turns[1].content.contains("[SHOW_PROJECT:towercaster]"));
    }

    #[tokio::test]
    async fn test_unknown_directive_key_yields_null_data() {
        let orchestrator = ChatOrchestrator::new(
            sessions(),
            Arc::new(ScriptedCompletion {
                reply: "Look [SHOW_PROJECT:doesnotexist]".to_string(),
            }),
            10,
        );

        let reply = orchestrator.handle(&request("show")).await.unwrap();
        assert_eq!(reply.show_project.as_deref(), Some("doesnotexist"));
        assert!(reply.project_data.is_none());
    }

    #[tokio::test]
    async fn test_failed_completion_leaves_history_untouched() {
        let store = sessions();
        let orchestrator = ChatOrchestrator::new(store.clone(), Arc::new(FailingCompletion), 10);

        let result = orchestrator.handle(&request("hi")).await;
        assert!(matches!(result, Err(Error::ProviderOverloaded(_))));
        assert_eq!(store.history_len("abc"), 0);
    }

    #[tokio::test]
    async fn test_prompt_is_system_then_recent_history_then_user() {
        let store = sessions();
        // Seed 7 turns (14 entries); only the last 10 should be sent
        for i in 0..7 {
            store.append_turn("abc", format!("q{}", i), format!("a{}", i));
        }

        let recording = Arc::new(RecordingCompletion {
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let orchestrator = ChatOrchestrator::new(store, recording.clone(), 10);
        orchestrator.handle(&request("latest")).await.unwrap();

        let seen = recording.seen.lock();
        assert_eq!(seen.len(), 12); // system + 10 history + user
        assert_eq!(seen[0].role, Role::System);
        assert_eq!(seen[1].content, "q2"); // oldest turns dropped from context
        assert_eq!(seen[11].role, Role::User);
        assert_eq!(seen[11].content, "latest");
    }
}
