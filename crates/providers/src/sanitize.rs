//! Reply sanitization.
//!
//! Some models leak chat-template control tokens into their output. Those are
//! stripped before a reply is stored or delivered.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Control-token patterns removed from model output.
static TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // <|im_start|>, <|endoftext|>
        Regex::new(r"<\|.*?\|>").unwrap(),
        // Fullwidth bars, as emitted by DeepSeek: <｜end▁of▁sentence｜>
        Regex::new(r"<｜.*?｜>").unwrap(),
        // <begin_of_sentence> and friends
        Regex::new(r"(?i)<[^<>]*?begin[^<>]*?sentence[^<>]*?>").unwrap(),
        // Llama sequence markers
        Regex::new(r"</?s>").unwrap(),
        Regex::new(r"\[/?INST\]").unwrap(),
    ]
});

static NEWLINE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip template artifacts, collapse runs of 3+ newlines to one blank line, and trim.
pub fn sanitize_reply(raw: &str) -> String {
    let mut text = raw.to_string();
    for pattern in TOKEN_PATTERNS.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    NEWLINE_RUNS.replace_all(&text, "\n\n").trim().to_string()
}
