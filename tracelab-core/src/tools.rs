//! Local text-analysis tools the `analyze` agent offers to the model.
//!
//! Dispatch is a fixed table from tool name to a typed handler. Raw model
//! arguments are decoded into the handler's argument struct and validated
//! before the handler runs; anything that fails is a `ToolInvocation` error.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{CoreResult, TraceLabError};
use crate::model::{ToolCall, ToolSpec};

pub const COUNT_WORDS: &str = "count_words";
pub const EXTRACT_KEYWORDS: &str = "extract_keywords";

const DEFAULT_KEYWORDS: usize = 5;
const MAX_KEYWORDS: usize = 50;

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").expect("valid regex"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("valid regex"));

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "could", "should", "may", "might", "must", "can", "this",
    "that", "these", "those", "i", "you", "he", "she", "it", "we", "they",
];

/// Arguments are checked after decoding and before the handler runs.
pub trait ValidateArgs {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountWordsArgs {
    pub text: String,
}

impl ValidateArgs for CountWordsArgs {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordStats {
    pub word_count: usize,
    pub character_count: usize,
    pub sentence_count: usize,
}

pub fn count_words(args: &CountWordsArgs) -> WordStats {
    let text = &args.text;
    WordStats {
        word_count: text.split_whitespace().count(),
        character_count: text.chars().count(),
        sentence_count: SENTENCE_END
            .split(text)
            .filter(|s| !s.trim().is_empty())
            .count(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractKeywordsArgs {
    pub text: String,
    #[serde(default = "default_keywords", deserialize_with = "lenient_usize")]
    pub n: usize,
}

fn default_keywords() -> usize {
    DEFAULT_KEYWORDS
}

impl ValidateArgs for ExtractKeywordsArgs {
    fn validate(&self) -> Result<(), String> {
        if self.n == 0 || self.n > MAX_KEYWORDS {
            return Err(format!("n must be between 1 and {MAX_KEYWORDS}, got {}", self.n));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordReport {
    pub keywords: Vec<Keyword>,
    pub total_unique_keywords: usize,
}

/// Most frequent non-stop-words longer than three characters.
/// Ties keep first-occurrence order.
pub fn extract_keywords(args: &ExtractKeywordsArgs) -> KeywordReport {
    let lower = args.text.to_lowercase();
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for m in WORD.find_iter(&lower) {
        let w = m.as_str();
        if w.chars().count() <= 3 || STOP_WORDS.contains(&w) {
            continue;
        }
        match index.get(w) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(w.to_string(), counts.len());
                counts.push((w.to_string(), 1));
            }
        }
    }
    let total_unique_keywords = counts.len();
    // stable: equal counts stay in first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    KeywordReport {
        keywords: counts
            .into_iter()
            .take(args.n)
            .map(|(word, count)| Keyword { word, count })
            .collect(),
        total_unique_keywords,
    }
}

/// Models often quote numbers; accept `5` and `"5"`.
fn lenient_usize<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| de::Error::custom(format!("expected a non-negative integer, got {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<usize>()
            .map_err(|_| de::Error::custom(format!("expected an integer, got \"{s}\""))),
        other => Err(de::Error::custom(format!("expected an integer, got {other}"))),
    }
}

type Handler = Box<dyn Fn(Value) -> CoreResult<Value> + Send + Sync>;

struct RegisteredTool {
    spec: ToolSpec,
    handler: Handler,
}

/// Fixed table of tools the model may call by name.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, RegisteredTool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolRegistry {
    /// `count_words` and `extract_keywords`.
    pub fn builtin() -> Self {
        let mut tools = BTreeMap::new();
        tools.insert(
            COUNT_WORDS,
            RegisteredTool {
                spec: ToolSpec {
                    name: COUNT_WORDS.into(),
                    description: "Count the number of words, characters, and sentences in the given text.".into(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "text": {"type": "string", "description": "The text to analyze"}
                        },
                        "required": ["text"]
                    }),
                },
                handler: typed(COUNT_WORDS, count_words),
            },
        );
        tools.insert(
            EXTRACT_KEYWORDS,
            RegisteredTool {
                spec: ToolSpec {
                    name: EXTRACT_KEYWORDS.into(),
                    description: "Extract the most common keywords from the text.".into(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "text": {"type": "string", "description": "The text to analyze"},
                            "n": {"type": "integer", "description": "Number of keywords to extract (default: 5)"}
                        },
                        "required": ["text"]
                    }),
                },
                handler: typed(EXTRACT_KEYWORDS, extract_keywords),
            },
        );
        Self { tools }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec.clone()).collect()
    }

    /// Decode, validate and run one tool call. Returns the tool's JSON output.
    pub fn invoke(&self, call: &ToolCall) -> CoreResult<Value> {
        let tool = self
            .tools
            .get(call.name.as_str())
            .ok_or_else(|| TraceLabError::ToolInvocation {
                tool: call.name.clone(),
                message: format!(
                    "unknown tool; available: {}",
                    self.tools.keys().copied().collect::<Vec<_>>().join(", ")
                ),
            })?;
        let args = object_arguments(&call.name, &call.arguments)?;
        (tool.handler)(args)
    }
}

fn typed<A, O>(name: &'static str, f: fn(&A) -> O) -> Handler
where
    A: DeserializeOwned + ValidateArgs + 'static,
    O: Serialize + 'static,
{
    Box::new(move |raw: Value| {
        let args: A = serde_json::from_value(raw).map_err(|e| invocation_error(name, e))?;
        args.validate().map_err(|m| invocation_error(name, m))?;
        serde_json::to_value(f(&args)).map_err(|e| invocation_error(name, e))
    })
}

fn invocation_error(tool: &str, message: impl std::fmt::Display) -> TraceLabError {
    TraceLabError::ToolInvocation {
        tool: tool.to_string(),
        message: message.to_string(),
    }
}

/// Arguments must be a JSON object, or a string holding one.
fn object_arguments(tool: &str, raw: &Value) -> CoreResult<Value> {
    match raw {
        Value::Object(_) => Ok(raw.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v @ Value::Object(_)) => Ok(v),
            _ => Err(invocation_error(tool, "arguments string is not a JSON object")),
        },
        other => Err(invocation_error(
            tool,
            format!("arguments must be a JSON object, got {other}"),
        )),
    }
}
