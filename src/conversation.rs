//! Conversation history for a single console session
//!
//! The conversation is an append-only list of role-tagged turns. Its full
//! contents are the prompt context sent to the model on every completion.

use serde::{Deserialize, Serialize};

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in the conversation
///
/// Serializes to the `{"role": ..., "content": ...}` shape chat backends expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
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

/// Append-only store of turns
///
/// There is no way to remove or edit a turn once appended; callers only get
/// shared slices or owned snapshots.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a conversation seeded with the system prompt
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    /// Add a turn to the tail of the conversation
    pub fn append(&mut self, turn: Turn) {
        tracing::debug!(role = %turn.role, len = turn.content.len(), "Appending turn");
        crate::metrics::TURNS_APPENDED
            .with_label_values(&[turn.role.as_str()])
            .inc();
        self.turns.push(turn);
    }

    /// Owned copy of the history; later appends are not visible through it
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_seeds_system_turn() {
        let conversation = Conversation::new("You are Echo.");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.turns()[0].role, Role::System);
        assert_eq!(conversation.turns()[0].content, "You are Echo.");
    }

    #[test]
    fn test_append_preserves_prefix() {
        let mut conversation = Conversation::new("system");
        let mut previous = conversation.snapshot();

        for i in 0..6 {
            let turn = if i % 2 == 0 {
                Turn::user(format!("question {}", i))
            } else {
                Turn::assistant(format!("answer {}", i))
            };
            conversation.append(turn);

            let current = conversation.snapshot();
            assert_eq!(current.len(), previous.len() + 1);
            assert_eq!(&current[..previous.len()], &previous[..]);
            previous = current;
        }
        assert_eq!(conversation.turns()[0].role, Role::System);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut conversation = Conversation::new("system");
        let snapshot = conversation.snapshot();
        conversation.append(Turn::user("hello"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.last().map(|t| t.role), Some(Role::User));
    }

    #[test]
    fn test_turn_serialization() {
        let json = serde_json::to_string(&Turn::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
