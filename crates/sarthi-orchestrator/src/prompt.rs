// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider request assembly.
//!
//! The system prompt carries the persona for the chat type plus every context
//! block; the message list is the capped history followed by the query.

use sarthi_core::types::{
    ChatMessage, ChatType, ContextBlock, ContextKind, ProviderRequest, Query, Role,
};

/// Appended to the system prompt when a reply is retried for script.
pub const ROMAN_SCRIPT_RETRY_INSTRUCTION: &str = "Your previous reply was not written in Roman script. \
Answer again using only Roman (Latin) letters; Hinglish is fine.";

/// Builds [`ProviderRequest`]s for one deployment.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    agent_name: String,
    max_tokens: u32,
}

impl PromptBuilder {
    pub fn new(agent_name: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            agent_name: agent_name.into(),
            max_tokens,
        }
    }

    /// Assemble the request for `model`. `context` holds the caller's blocks
    /// followed by any gathered during augmentation.
    pub fn build(
        &self,
        query: &Query,
        context: &[ContextBlock],
        model: &str,
        script_retry: bool,
    ) -> ProviderRequest {
        let mut system_prompt = self.persona(query.chat_type);

        if !context.is_empty() {
            system_prompt.push_str("\n\n## Context\n");
            for block in context {
                system_prompt.push_str(&render_block(block));
            }
        }

        if script_retry {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(ROMAN_SCRIPT_RETRY_INSTRUCTION);
        }

        let mut messages: Vec<ChatMessage> = query
            .recent_history
            .iter()
            .filter(|turn| turn.role != Role::System)
            .map(|turn| ChatMessage {
                role: turn.role,
                content: turn.content.clone(),
            })
            .collect();
        messages.push(ChatMessage {
            role: Role::User,
            content: query.text.clone(),
        });

        ProviderRequest {
            model: model.to_string(),
            system_prompt,
            messages,
            max_tokens: self.max_tokens,
            temperature: None,
        }
    }

    fn persona(&self, chat_type: ChatType) -> String {
        let name = &self.agent_name;
        match chat_type {
            ChatType::General => format!(
                "You are {name}, a friendly learning companion for students. \
                 Answer clearly and concisely."
            ),
            ChatType::StudyAssistant => format!(
                "You are {name}, a study assistant. Use the student's study data \
                 and documents below when they are relevant. Reply in English or \
                 Hinglish written in Roman script."
            ),
        }
    }
}

fn render_block(block: &ContextBlock) -> String {
    let label = match block.kind {
        ContextKind::Profile => "Student profile",
        ContextKind::Document => "Document",
        ContextKind::SearchResult => "Search result",
    };
    match &block.title {
        Some(title) => format!("### {label}: {title}\n{}\n", block.content),
        None => format!("### {label}\n{}\n", block.content),
    }
}
