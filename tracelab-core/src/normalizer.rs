use crate::model::ChatRequest;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// Unicode NFC normalization + BOM strip + CRLF -> LF + trim.
pub fn clean_text(s: &str) -> String {
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    if t.contains("\r\n") {
        t = t.replace("\r\n", "\n");
    }
    t.trim().to_string()
}

/// Clean message text and drop duplicate tool specs.
pub fn normalize_chat(mut req: ChatRequest) -> ChatRequest {
    for msg in &mut req.messages {
        msg.content = clean_text(&msg.content);
    }
    let mut seen = HashSet::new();
    req.tools.retain(|t| seen.insert(t.name.clone()));
    req
}
