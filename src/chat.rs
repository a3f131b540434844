//! Chat prompt assembly.
//!
//! Turns a chat request from the workflow canvas (user message, prior
//! turns, and the context sources wired into the chat node) into the
//! message list sent to the chat engine.

use serde::{Deserialize, Serialize};

/// Fixed opening of every system prompt
const SYSTEM_PREAMBLE: &str = "You are an AI assistant in a node-based workflow app.\nUse the provided CONTEXT SOURCES to answer the user's query.";

const SOURCE_FOOTER: &str = "----------------------------------";

/// Role of a message sent to the chat engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message sent to the chat engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Speaker of a previous turn, as the frontend names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Model,
}

/// A previous turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub text: String,
}

/// Content attached to the chat (scraped page, transcript, note, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSource {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
}

/// Everything needed to produce one assistant reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<HistoryEntry>,
    pub context_sources: Vec<ContextSource>,
    pub system_instruction: Option<String>,
}

impl ChatRequest {
    /// System prompt with the user's instruction and numbered context blocks
    pub fn system_prompt(&self) -> String {
        let context_block = self
            .context_sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                format!(
                    "--- SOURCE {} ({}: {}) ---\n{}\n{}",
                    i + 1,
                    source.source_type.to_uppercase(),
                    source.title.as_deref().unwrap_or("Untitled"),
                    source.content,
                    SOURCE_FOOTER
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let instruction = match self.system_instruction.as_deref() {
            Some(i) if !i.is_empty() => format!("USER DEFINED ROLE/INSTRUCTION: {}", i),
            _ => String::new(),
        };

        format!(
            "{}\n\n{}\n\nCONTEXT SOURCES:\n{}",
            SYSTEM_PREAMBLE, instruction, context_block
        )
    }

    /// System prompt, then history, then the new user message
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::new(ChatRole::System, self.system_prompt()));

        for entry in &self.history {
            let role = match entry.role {
                HistoryRole::Model => ChatRole::Assistant,
                HistoryRole::User => ChatRole::User,
            };
            messages.push(ChatMessage::new(role, entry.text.clone()));
        }

        messages.push(ChatMessage::new(ChatRole::User, self.message.clone()));
        messages
    }
}
