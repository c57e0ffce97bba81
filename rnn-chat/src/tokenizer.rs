//! Whitespace/punctuation tokenizer shared by training and chat.

pub const BOS: &str = "<BOS>";
pub const EOS: &str = "<EOS>";
pub const NL: &str = "<NL>";
pub const QUESTION: &str = "<Q>";
pub const ANSWER: &str = "<A>";

/// Structural tokens removed from generated text.
pub const MARKERS: [&str; 5] = [BOS, EOS, NL, QUESTION, ANSWER];

const PUNCTUATION: [char; 7] = ['.', ',', '!', '?', ';', ':', '-'];

// `-` is split off as a token but keeps its leading space when rendered.
const ATTACHED_PUNCTUATION: [&str; 6] = [".", ",", "!", "?", ";", ":"];

// Blank text, newlines included, holds no tokens.
fn split_tokens(text: &str) -> Vec<String> {
    if text.trim().is_empty() { return Vec::new(); }
    let mut spaced = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        match c {
            '\r' => {}
            '\n' => { spaced.push(' '); spaced.push_str(NL); spaced.push(' '); }
            c if PUNCTUATION.contains(&c) => { spaced.push(' '); spaced.push(c); spaced.push(' '); }
            c => spaced.push(c),
        }
    }
    spaced.split_whitespace().map(str::to_string).collect()
}

/// Splits text into tokens. Empty or blank input yields `[<BOS>]`.
pub fn tokenize(text: &str) -> Vec<String> {
    let tokens = split_tokens(text);
    if tokens.is_empty() { vec![BOS.to_string()] } else { tokens }
}

/// Tokenizes a training corpus wrapped in `<BOS>` … `<EOS>`.
/// Returns `None` when the corpus itself holds no tokens.
pub fn tokenize_corpus(text: &str) -> Option<Vec<String>> {
    let body = split_tokens(text);
    if body.is_empty() { return None; }
    let mut tokens = Vec::with_capacity(body.len() + 2);
    tokens.push(BOS.to_string());
    tokens.extend(body);
    tokens.push(EOS.to_string());
    Some(tokens)
}

pub fn is_marker(token: &str) -> bool {
    MARKERS.contains(&token)
}

/// Renders tokens back to text: punctuation re-attached, markers stripped.
pub fn detokenize<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut out = String::new();
    for t in tokens.iter().map(AsRef::as_ref) {
        if t.is_empty() || is_marker(t) { continue; }
        if !out.is_empty() && !ATTACHED_PUNCTUATION.contains(&t) { out.push(' '); }
        out.push_str(t);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
