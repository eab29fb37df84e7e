// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sarthi ask` command implementation.

use clap::Args;
use sarthi_config::SarthiConfig;
use sarthi_core::SarthiError;
use sarthi_core::types::{ChatType, RouteRequest};

use crate::stack::Stack;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Student the message belongs to.
    #[arg(long)]
    pub user: String,

    /// Conversation the message belongs to.
    #[arg(long, default_value = "cli")]
    pub conversation: String,

    /// `general` or `study_assistant`.
    #[arg(long, default_value = "general", value_parser = parse_chat_type)]
    pub chat_type: ChatType,

    /// Call only this provider.
    #[arg(long)]
    pub provider: Option<String>,

    /// Call only this model.
    #[arg(long)]
    pub model: Option<String>,

    /// Ask for retrieved documents even if the query does not need them.
    #[arg(long)]
    pub augment: bool,

    /// The message to route.
    pub message: String,
}

fn parse_chat_type(s: &str) -> Result<ChatType, String> {
    s.parse::<ChatType>()
        .map_err(|_| format!("unknown chat type `{s}` (expected general or study_assistant)"))
}

/// Route one message and print the response as JSON.
pub async fn run_ask(config: &SarthiConfig, args: AskArgs) -> Result<(), SarthiError> {
    let stack = Stack::build(config).await?;

    let mut request = RouteRequest::new(args.user, args.conversation, args.message, args.chat_type);
    request.provider = args.provider;
    request.model = args.model;
    request.augment = args.augment;

    let result = stack.orchestrator.route(request).await;
    stack.shutdown().await;
    let response = result?;

    let json = serde_json::to_string_pretty(&response)
        .map_err(|e| SarthiError::Internal(format!("failed to encode response: {e}")))?;
    println!("{json}");
    Ok(())
}
