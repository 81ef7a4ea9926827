//! Prompt templates for retrieval-grounded answering.

/// System prompt: the assistant answers strictly from the retrieved context
/// handed over inside `<search_results>` tags.
pub const SYSTEM_PROMPT: &str = "\
You are a knowledgeable assistant that answers questions about the user's \
document collection.

The relevant search results provided below, delimited by \
<search_results></search_results>, are the necessary information already \
obtained from the documents. The search results set the context for \
addressing the question, so you do not need to access the documents \
themselves.

Only use data from the search results to answer. If the search results do \
not contain the answer, say so plainly instead of guessing. Keep answers \
concise and quote figures exactly as they appear in the results.";

/// User-message template with `{search_results}` and `{question}` slots.
pub const USER_MESSAGE_TEMPLATE: &str = "\
<search_results>
{search_results}
</search_results>

Question: {question}";

/// Renders the user message for a query and its retrieved context.
pub fn render_user_message(search_results: &str, question: &str) -> String {
    USER_MESSAGE_TEMPLATE
        .replace("{search_results}", search_results)
        .replace("{question}", question)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_both_slots() {
        let rendered = render_user_message("ctx line", "what now?");
        assert!(rendered.contains("<search_results>\nctx line\n</search_results>"));
        assert!(rendered.ends_with("Question: what now?"));
        assert!(!rendered.contains('{'));
    }
}
