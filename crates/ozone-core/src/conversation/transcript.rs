//! Transcript: append-only turns, plus in-place replacement by turn id.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Turn id: wall-clock milliseconds, bumped when two turns land in the same millisecond.
pub type TurnId = i64;

/// Emotion marker attached to assistant turns that report a failure.
pub const CONCERNED: &str = "concerned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub role: Role,
    pub content: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub emotion: Option<String>,
    /// For assistant turns: id of the user turn being answered.
    #[serde(default)]
    pub in_reply_to: Option<TurnId>,
}

#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
    last_id: TurnId,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self, now: i64) -> TurnId {
        let id = now.max(self.last_id + 1);
        self.last_id = id;
        id
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> TurnId {
        self.push(Role::User, content.into(), None, None)
    }

    pub fn push_assistant(
        &mut self,
        content: impl Into<String>,
        emotion: Option<String>,
        in_reply_to: TurnId,
    ) -> TurnId {
        self.push(Role::Assistant, content.into(), emotion, Some(in_reply_to))
    }

    fn push(&mut self, role: Role, content: String, emotion: Option<String>, in_reply_to: Option<TurnId>) -> TurnId {
        let now = Utc::now().timestamp_millis();
        let id = self.next_id(now);
        self.turns.push(ConversationTurn {
            id,
            role,
            content,
            timestamp: now,
            emotion,
            in_reply_to,
        });
        id
    }

    /// Replace the content and emotion of turn `id` in place. Position, role, and
    /// correlation are kept. Returns false when no such turn exists.
    pub fn replace(&mut self, id: TurnId, content: impl Into<String>, emotion: Option<String>) -> bool {
        match self.turns.iter_mut().find(|t| t.id == id) {
            Some(turn) => {
                turn.content = content.into();
                turn.emotion = emotion;
                turn.timestamp = Utc::now().timestamp_millis();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: TurnId) -> Option<&ConversationTurn> {
        self.turns.iter().find(|t| t.id == id)
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Assistant turns answering the given user turn.
    pub fn replies_to(&self, user_turn: TurnId) -> impl Iterator<Item = &ConversationTurn> {
        self.turns
            .iter()
            .filter(move |t| t.in_reply_to == Some(user_turn))
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
    fn test_ids_strictly_increase() {
        let mut t = Transcript::new();
        let ids: Vec<TurnId> = (0..50).map(|i| t.push_user(format!("m{}", i))).collect();
        assert!(ids.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_replace_keeps_position_and_length() {
        let mut t = Transcript::new();
        let user = t.push_user("hello");
        let placeholder = t.push_assistant("…", None, user);
        let other = t.push_user("second");

        assert!(t.replace(placeholder, "hi there", Some(CONCERNED.to_string())));
        assert_eq!(t.len(), 3);
        assert_eq!(t.turns()[1].id, placeholder);
        assert_eq!(t.turns()[1].content, "hi there");
        assert_eq!(t.turns()[1].emotion.as_deref(), Some(CONCERNED));
        assert_eq!(t.turns()[2].id, other);
        assert_eq!(t.replies_to(user).count(), 1);
    }

    #[test]
    fn test_replace_unknown_id() {
        let mut t = Transcript::new();
        t.push_user("hello");
        assert!(!t.replace(-1, "x", None));
        assert_eq!(t.turns()[0].content, "hello");
    }
}
