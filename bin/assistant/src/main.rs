//! Interactive front-end: one conversation per process, answers streamed
//! to stdout as they are produced.

mod config;
mod error;

use crate::config::AssistantConfig;
use crate::error::CliError;
use rootcause::Report;
use scm_assistant_ai::OpenAiCompatibleBackend;
use scm_assistant_conversation::InMemoryMessageStore;
use scm_assistant_core::{ConversationId, RequestContext, UserId};
use scm_assistant_gateway::HttpGateway;
use scm_assistant_router::{Assistant, ChatRequest};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PROMPT: &str = "> ";

fn print_flush(text: &str) {
    let mut stdout = std::io::stdout().lock();
    // A closed stdout surfaces on the next prompt write.
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

#[tokio::main]
async fn main() -> Result<(), Report<CliError>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AssistantConfig::from_env().map_err(|e| CliError::Config {
        reason: e.to_string(),
    })?;
    tracing::info!(model = %config.llm.model, gateway = %config.gateway.base_url, "Loaded configuration");

    let gateway = HttpGateway::new(&config.gateway).map_err(|e| CliError::Startup {
        component: "gateway client",
        reason: e.to_string(),
    })?;
    let llm = OpenAiCompatibleBackend::new(&config.llm).map_err(|e| CliError::Startup {
        component: "LLM client",
        reason: e.to_string(),
    })?;
    let assistant = Assistant::new(
        Arc::new(gateway),
        Arc::new(llm),
        Arc::new(InMemoryMessageStore::new()),
        &config.settings(),
    );

    let owner = UserId::new();
    let conversation = ConversationId::new();
    tracing::info!(%conversation, "Conversation started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_flush(PROMPT);
        let line = tokio::select! {
            line = lines.next_line() => line.map_err(|e| CliError::Io { reason: e.to_string() })?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        let ctx = RequestContext::new().with_timeout(config.request_timeout());
        let request = ChatRequest::new(message).in_conversation(conversation);
        match assistant.chat_stream(&ctx, owner, request, &print_flush).await {
            Ok(response) => {
                print_flush("\n");
                tracing::debug!(
                    handler = response.handler.as_deref().unwrap_or("llm"),
                    steps = response.steps.len(),
                    "Answered"
                );
                if let Some(error) = response.error {
                    tracing::warn!(%error, "Answer carried an error");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Message rejected"),
        }
    }

    print_flush("\n");
    Ok(())
}
