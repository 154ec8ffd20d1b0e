//! Conversation history for a single session

use serde::{Deserialize, Serialize};

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model, always the first turn
    System,
    /// Something the user typed or said
    User,
    /// A completed model reply
    Assistant,
}

impl Role {
    /// Wire name used by chat completion APIs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged utterance
///
/// Serializes to the `{"role": ..., "content": ...}` shape chat APIs expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only conversation history
///
/// The system turn is inserted on construction and is always at index 0.
/// Turns can only be appended; there is no way to edit or remove one.
#[derive(Debug, Clone)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start a transcript with the given system prompt
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::new(Role::System, system_prompt)],
        }
    }

    /// Append a user turn holding the raw input text
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, content));
    }

    /// Append an assistant turn holding a full reply
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::new(Role::Assistant, content));
    }

    /// All turns in order, system turn first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The system prompt this session was started with
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.turns[0].content
    }

    /// Most recent turn
    #[must_use]
    pub fn last(&self) -> &Turn {
        // Never empty: the system turn is inserted on construction
        &self.turns[self.turns.len() - 1]
    }

    /// Number of turns including the system turn
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether there are no turns, never true after construction
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of turns authored by `role`
    #[must_use]
    pub fn count(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }

    /// Roles in order, handy for asserting conversation shape
    #[must_use]
    pub fn roles(&self) -> Vec<Role> {
        self.turns.iter().map(|t| t.role).collect()
    }
}
