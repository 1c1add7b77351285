// src/services/context.rs
use crate::completion_client::PromptMessage;
use crate::models::chat::Message;

/// Builds the prompt for one completion call: the system instruction followed
/// by the last `window_size` messages of `history`, oldest first.
///
/// `history` must already be in chronological order; it is only read.
pub fn assemble_context(
    history: &[Message],
    window_size: usize,
    system_instruction: &str,
) -> Vec<PromptMessage> {
    let start = history.len().saturating_sub(window_size);
    let recent = &history[start..];

    let mut context = Vec::with_capacity(recent.len() + 1);
    context.push(PromptMessage::system(system_instruction));
    context.extend(recent.iter().map(|message| PromptMessage {
        role: message.role.into(),
        content: message.content.clone(),
    }));
    context
}
