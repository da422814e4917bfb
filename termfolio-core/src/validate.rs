//! Chat payload validation and sanitization
//!
//! Pure functions over the parsed request body. The payload is checked
//! before any session or orchestration logic runs: reserved object-internal
//! key names are rejected outright (prototype-pollution-shaped payloads),
//! the message is bounds-checked, and the session id is stripped down to a
//! safe character set.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Maximum accepted message length, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 500;

/// Maximum session id length after sanitization.
pub const MAX_SESSION_ID_LENGTH: usize = 50;

/// Session id used when the client sends none (or nothing survives
/// sanitization).
pub const DEFAULT_SESSION_ID: &str = "default";

/// Top-level keys that make a payload invalid regardless of other fields.
const RESERVED_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

static SESSION_ID_INVALID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-Z0-9_-]").expect("session id pattern is valid")
});

/// A payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub message: String,
    pub session_id: String,
}

/// Result of validating a raw request body.
#[derive(Debug)]
pub struct Validation {
    pub errors: Vec<String>,
    pub sanitized: Option<Sanitized>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn invalid(errors: Vec<String>) -> Self {
        Self {
            errors,
            sanitized: None,
        }
    }
}

/// Validate and sanitize a chat request body.
pub fn validate(body: &Value) -> Validation {
    let Some(object) = body.as_object() else {
        return Validation::invalid(vec!["Invalid request payload".to_string()]);
    };

    // Reserved keys invalidate the payload before any field is looked at
    if RESERVED_KEYS.iter().any(|k| object.contains_key(*k)) {
        return Validation::invalid(vec!["Invalid request payload".to_string()]);
    }

    let mut errors = Vec::new();

    let message = match object.get("message") {
        None | Some(Value::Null) => {
            errors.push("Message is required".to_string());
            String::new()
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                errors.push("Message cannot be empty".to_string());
            } else if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
                errors.push(format!(
                    "Message too long. Max {} chars.",
                    MAX_MESSAGE_LENGTH
                ));
            }
            trimmed.to_string()
        }
        Some(_) => {
            errors.push("Message must be a string".to_string());
            String::new()
        }
    };

    let session_id = match object.get("sessionId") {
        None | Some(Value::Null) => DEFAULT_SESSION_ID.to_string(),
        Some(Value::String(s)) => sanitize_session_id(s),
        Some(_) => {
            errors.push("Session ID must be a string".to_string());
            DEFAULT_SESSION_ID.to_string()
        }
    };

    if errors.is_empty() {
        Validation {
            errors,
            sanitized: Some(Sanitized {
                message,
                session_id,
            }),
        }
    } else {
        Validation::invalid(errors)
    }
}

/// Strip a client-supplied session id down to `[a-zA-Z0-9_-]`, capped at
/// [`MAX_SESSION_ID_LENGTH`]. An id that is empty after stripping falls back
/// to [`DEFAULT_SESSION_ID`].
pub fn sanitize_session_id(raw: &str) -> String {
    let stripped = SESSION_ID_INVALID.replace_all(raw, "");
    // Only ASCII survives the strip, so byte indexing is safe
    let capped = &stripped[..stripped.len().min(MAX_SESSION_ID_LENGTH)];
    if capped.is_empty() {
        DEFAULT_SESSION_ID.to_string()
    } else {
        capped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_payload() {
        let v = validate(&json!({"message": "hi", "sessionId": "abc-123"}));
        assert!(v.is_valid());
        let s = v.sanitized.unwrap();
        assert_eq!(s.message, "hi");
        assert_eq!(s.session_id, "abc-123");
    }

    #[test]
    fn test_message_required() {
        let v = validate(&json!({}));
        assert!(!v.is_valid());
        assert_eq!(v.errors, vec!["Message is required"]);
        assert!(v.sanitized.is_none());
    }

    #[test]
    fn test_message_must_be_string() {
        let v = validate(&json!({"message": 42}));
        assert!(!v.is_valid());
        assert_eq!(v.errors, vec!["Message must be a string"]);
    }

    #[test]
    fn test_whitespace_message_rejected() {
        let v = validate(&json!({"message": "  "}));
        assert!(!v.is_valid());
        assert_eq!(v.errors, vec!["Message cannot be empty"]);
    }

    #[test]
    fn test_message_at_limit_accepted() {
        let v = validate(&json!({"message": "x".repeat(MAX_MESSAGE_LENGTH)}));
        assert!(v.is_valid());
    }

    #[test]
    fn test_message_over_limit_rejected() {
        let v = validate(&json!({"message": "x".repeat(MAX_MESSAGE_LENGTH + 1)}));
        assert!(!v.is_valid());
        assert_eq!(v.errors, vec!["Message too long. Max 500 chars."]);
    }

    #[test]
    fn test_message_trimmed() {
        let v = validate(&json!({"message": "  hello  "}));
        assert_eq!(v.sanitized.unwrap().message, "hello");
    }

    #[test]
    fn test_session_id_sanitized() {
        let v = validate(&json!({"message": "hi", "sessionId": "a!!b"}));
        assert!(v.is_valid());
        assert_eq!(v.sanitized.unwrap().session_id, "ab");
    }

    #[test]
    fn test_session_id_defaults() {
        let v = validate(&json!({"message": "hi"}));
        assert_eq!(v.sanitized.unwrap().session_id, DEFAULT_SESSION_ID);

        // All characters stripped: fall back to the default
        let v = validate(&json!({"message": "hi", "sessionId": "!!!"}));
        assert_eq!(v.sanitized.unwrap().session_id, DEFAULT_SESSION_ID);
    }

    #[test]
    fn test_session_id_capped() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_session_id(&long).len(), MAX_SESSION_ID_LENGTH);
    }

    #[test]
    fn test_session_id_must_be_string() {
        let v = validate(&json!({"message": "hi", "sessionId": 7}));
        assert!(!v.is_valid());
        assert_eq!(v.errors, vec!["Session ID must be a string"]);
    }

    #[test]
    fn test_reserved_keys_rejected() {
        for key in RESERVED_KEYS {
            let mut object = serde_json::Map::new();
            object.insert("message".to_string(), json!("hi"));
            object.insert(key.to_string(), json!({"x": 1}));
            let v = validate(&Value::Object(object));
            assert!(!v.is_valid(), "payload with {:?} must be invalid", key);
            assert_eq!(v.errors, vec!["Invalid request payload"]);
        }
    }

    #[test]
    fn test_non_object_payload_rejected() {
        assert!(!validate(&json!("just a string")).is_valid());
        assert!(!validate(&json!([1, 2, 3])).is_valid());
    }

    #[test]
    fn test_unicode_session_id_stripped() {
        let v = validate(&json!({"message": "hi", "sessionId": "héllo wörld"}));
        assert_eq!(v.sanitized.unwrap().session_id, "hllowrld");
    }
}
