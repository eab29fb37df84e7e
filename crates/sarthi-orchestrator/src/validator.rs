// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output language-policy checks.

use std::fmt;

use sarthi_core::types::ChatType;

/// Language policy applied to generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Any script is accepted; only emptiness is rejected.
    Any,
    /// Replies must be readable in Roman (Latin) script, e.g. English or Hinglish.
    RomanScript,
}

impl OutputPolicy {
    pub fn for_chat_type(chat_type: ChatType) -> Self {
        match chat_type {
            ChatType::General => OutputPolicy::Any,
            ChatType::StudyAssistant => OutputPolicy::RomanScript,
        }
    }
}

/// Why an output was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputIssue {
    /// Empty or whitespace-only. Never retried in-tier.
    Empty,
    /// Written entirely in a non-Latin script. Earns one in-tier retry.
    NonRomanScript,
}

impl fmt::Display for OutputIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputIssue::Empty => write!(f, "empty output"),
            OutputIssue::NonRomanScript => write!(f, "output is not in Roman script"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub valid: bool,
    pub issue: Option<OutputIssue>,
}

impl Verdict {
    fn ok() -> Self {
        Self {
            valid: true,
            issue: None,
        }
    }

    fn rejected(issue: OutputIssue) -> Self {
        Self {
            valid: false,
            issue: Some(issue),
        }
    }
}

/// Check `text` against `policy`.
pub fn validate(text: &str, policy: OutputPolicy) -> Verdict {
    if text.trim().is_empty() {
        return Verdict::rejected(OutputIssue::Empty);
    }

    match policy {
        OutputPolicy::Any => Verdict::ok(),
        OutputPolicy::RomanScript if violates_roman_script(text) => {
            Verdict::rejected(OutputIssue::NonRomanScript)
        }
        OutputPolicy::RomanScript => Verdict::ok(),
    }
}

/// Letters present, but no Latin letters, ASCII digits or basic punctuation.
///
/// Mixed text (a Devanagari word inside a Hinglish sentence, a formula with
/// digits) passes; only single non-Latin script replies fail.
fn violates_roman_script(text: &str) -> bool {
    let has_letters = text.chars().any(char::is_alphabetic);
    let has_roman_anchor = text
        .chars()
        .any(|c| c.is_ascii_alphanumeric() || c.is_ascii_punctuation());
    has_letters && !has_roman_anchor
}
