use retrova_core::ChatMessage;
use tracing::debug;

/// Per-message envelope tokens (role framing) and the reply priming added
/// once per conversation.
const MESSAGE_OVERHEAD: usize = 3;
const REPLY_PRIMING: usize = 3;

/// Token budget for a language tag. Unrecognized tags fall back to the
/// English budget.
pub fn token_budget_for(language: &str) -> usize {
    match language {
        "en" => 4096,
        "vi" => 8192,
        _ => 4096,
    }
}

/// Rough token estimate for one message: four characters per token plus the
/// message envelope.
pub fn estimate_message_tokens(message: &ChatMessage) -> usize {
    message.content.chars().count() / 4 + MESSAGE_OVERHEAD
}

/// Token estimate for a full `[system, ...history, user]` conversation.
pub fn conversation_tokens(
    system: &ChatMessage,
    history: &[ChatMessage],
    user: &ChatMessage,
) -> usize {
    let history_tokens: usize = history.iter().map(estimate_message_tokens).sum();
    estimate_message_tokens(system) + history_tokens + estimate_message_tokens(user) + REPLY_PRIMING
}

/// Greedily drops the oldest history entries until the conversation fits the
/// language's token budget.
///
/// Returns a contiguous tail of `history` in original order. The system and
/// user messages are mandatory and never dropped, so the budget may still be
/// exceeded once history is exhausted — that is accepted, not truncated
/// further.
pub fn trim_history(
    system: &ChatMessage,
    history: &[ChatMessage],
    user: &ChatMessage,
    language: &str,
) -> Vec<ChatMessage> {
    let budget = token_budget_for(language);
    let mut start = 0;
    while start < history.len() && conversation_tokens(system, &history[start..], user) > budget {
        start += 1;
    }
    if start > 0 {
        debug!(
            dropped = start,
            kept = history.len() - start,
            budget,
            "trimmed conversation history"
        );
    }
    history[start..].to_vec()
}
