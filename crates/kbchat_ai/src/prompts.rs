use kbchat_core::conversation::ChatEntry;

use crate::retrieve::RetrievedChunk;

/// Retrieval-mode prompt. Chunks appear in retrieval order, separated by a blank line.
pub fn grounded_prompt(chunks: &[RetrievedChunk], question: &str) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        r#"You are answering questions about the user's uploaded documents.

Rules (non-negotiable):
1) Answer ONLY from the context below. Do not use outside knowledge.
2) If the answer is not in the context, say explicitly: "The answer is not in the provided documents."
3) Keep the answer as detailed as the context allows.

Context:
{context}

Question:
{question}

Answer:
"#
    )
}

/// Plain-mode prompt: prior turns as `Role: text` lines, then the new question.
pub fn conversation_prompt(history: &[ChatEntry], question: &str) -> String {
    let lines = history
        .iter()
        .map(|e| format!("{}: {}", e.role.label(), e.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{lines}\nUser: {question}\nAI:")
}

pub fn summarize_prompt(query: &str, snippets: &str) -> String {
    format!("Summarize this for the question: {query}\n\n{snippets}")
}
