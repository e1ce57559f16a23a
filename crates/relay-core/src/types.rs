use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a chat user.
///
/// Telegram hands out numeric ids; other sources may use strings. Both are
/// stored as their decimal/string form so the cache never has to care.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation history.
///
/// Serializes to the `{"role", "content"}` shape the completion endpoint
/// expects, so histories go on the wire unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_serializes_lowercase_role() {
        let turn = ConversationTurn::assistant("Hi there!");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"Hi there!"}"#);
    }

    #[test]
    fn turn_deserializes_from_wire_shape() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"system","content":"be nice"}"#).unwrap();
        assert_eq!(turn, ConversationTurn::system("be nice"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let res = serde_json::from_str::<ConversationTurn>(r#"{"role":"tool","content":"x"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn user_id_from_telegram_numeric_id() {
        let id = UserId::from(123_456_789_u64);
        assert_eq!(id.as_str(), "123456789");
        assert_eq!(id, UserId::from("123456789"));
    }
}
