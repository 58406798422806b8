//! Grounding prompt construction.

use crate::kb::KnowledgeRecord;

/// Fixed system instruction: the assistant's role plus the exact reply shape
/// required for action intents.
const SYSTEM_INSTRUCTION: &str = "You are a helpful credit card assistant.\n\
Use the knowledge base context above when possible.\n\
\n\
If the user requests a supported action (paying a bill, tracking a card),\n\
respond with only a JSON object of this exact shape:\n\
{\"type\": \"action\", \"action\": \"pay_bill\", \"params\": {\"amount\": 5000}}\n\
\n\
Otherwise, answer normally in plain text.";

/// Pure function: identical inputs always produce an identical prompt.
pub fn build_prompt(user_text: &str, contexts: &[KnowledgeRecord]) -> String {
    let mut prompt = String::new();

    if !contexts.is_empty() {
        prompt.push_str("Knowledge base context:\n");
        for record in contexts {
            prompt.push_str("Q: ");
            prompt.push_str(&record.q);
            prompt.push_str("\nA: ");
            prompt.push_str(&record.answer);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str(SYSTEM_INSTRUCTION);
    prompt.push_str("\n\nUser: ");
    prompt.push_str(user_text);
    prompt
}
