//! The prompt input field, shared by the keyboard surface, the voice bridge and the orchestrator.

use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct PromptField {
    text: Arc<Mutex<String>>,
}

impl PromptField {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.text.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self) -> String {
        self.lock().clone()
    }

    pub fn set(&self, text: impl Into<String>) {
        *self.lock() = text.into();
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Append typed text or a final transcription: space-joined, never overwriting what is there.
    pub fn append(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let mut current = self.lock();
        if !current.is_empty() && !current.ends_with(char::is_whitespace) {
            current.push(' ');
        }
        current.push_str(text);
    }

    /// Remove `submitted` after it was answered. Text added behind it while the
    /// request was in flight stays; a field edited in the meantime is left alone.
    pub fn consume(&self, submitted: &str) {
        let mut current = self.lock();
        let rest = match current.trim_start().strip_prefix(submitted) {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim().to_string(),
            _ => return,
        };
        *current = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_is_space_joined() {
        let prompt = PromptField::new();
        prompt.append("open the");
        prompt.append("  settings ");
        assert_eq!(prompt.get(), "open the settings");
    }

    #[test]
    fn test_append_keeps_typed_text() {
        let prompt = PromptField::new();
        prompt.set("Summarize ");
        prompt.append("this file");
        prompt.append("");
        assert_eq!(prompt.get(), "Summarize this file");
    }

    #[test]
    fn test_consume_keeps_text_added_behind_the_submission() {
        let prompt = PromptField::new();
        prompt.set("hello");
        prompt.append("and then");
        prompt.consume("hello");
        assert_eq!(prompt.get(), "and then");

        prompt.consume("and then");
        assert_eq!(prompt.get(), "");
    }

    #[test]
    fn test_consume_leaves_edited_field() {
        let prompt = PromptField::new();
        prompt.set("hello there");
        prompt.consume("hell");
        assert_eq!(prompt.get(), "hello there");
        prompt.consume("goodbye");
        assert_eq!(prompt.get(), "hello there");
    }
}
