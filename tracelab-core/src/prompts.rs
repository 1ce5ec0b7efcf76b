//! Static prompt templates for the four agent tasks.
//!
//! Placeholders are `{name}`; substitution is single-pass, so text that itself
//! contains `{...}` is inserted verbatim.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::model::ChatMessage;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid regex"));

/// A system prompt plus a user-turn template.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    /// Render `[system, user]` messages. Unknown placeholders are left as-is.
    pub fn messages(&self, vars: &[(&str, &str)]) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system),
            ChatMessage::user(render(self.user, vars)),
        ]
    }
}

pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub const SUMMARIZE: PromptTemplate = PromptTemplate {
    name: "summarize",
    system: "You are an expert academic summarizer. Your task is to analyze the provided text and create a structured summary.

Instructions:
- Extract 3-5 key points from the text
- Provide a one-sentence takeaway that captures the main message
- Maintain an academic and professional tone
- Format your response as structured markdown

Output Format:
## Key Points
1. [First key point]
2. [Second key point]
3. [Third key point]
[Additional points as needed]

## Takeaway
[One sentence summarizing the main message]",
    user: "Summarize the following text:\n\n{text}",
};

pub const ANALYZE: PromptTemplate = PromptTemplate {
    name: "analyze",
    system: "You are a text analysis assistant with access to tools.

Use the count_words tool to measure the text and the extract_keywords tool to find its main terms. Call each tool at most once, passing the full text.
After the tool results arrive, write a short analysis in markdown covering length, key themes and tone.",
    user: "Analyze the following text:\n\n{text}",
};

pub const CHAT: PromptTemplate = PromptTemplate {
    name: "chat",
    system: "You are a helpful assistant. Answer clearly and concisely, and keep track of what was said earlier in the conversation.",
    user: "{message}",
};

pub const RAG: PromptTemplate = PromptTemplate {
    name: "rag",
    system: "You answer questions using only the provided context. If the context does not contain the answer, say that you don't know. Keep answers short and cite the relevant sentence when possible.",
    user: "Context:\n{context}\n\nQuestion: {question}",
};
