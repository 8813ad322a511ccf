//! Segmentation of source documents into fact units.

/// A sentence-level chunk of one source document.
#[derive(Debug, Clone, PartialEq)]
pub struct FactUnit {
    pub text: String,
    pub url: String,
    pub score: f32,
}

/// Split `content` on sentence-terminal punctuation followed by whitespace,
/// then re-merge consecutive sentences until each chunk is longer than
/// `min_chars`. A short trailing chunk is kept as is.
pub fn segment(content: &str, min_chars: usize) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(content) {
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence);
        if current.chars().count() > min_chars {
            units.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        units.push(current);
    }
    units
}

fn split_sentences(content: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = content.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = match chars.peek() {
            Some((_, next)) => next.is_whitespace(),
            None => true,
        };
        if at_boundary {
            let end = idx + c.len_utf8();
            push_trimmed(&mut sentences, &content[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut sentences, &content[start..]);
    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, piece: &'a str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece);
    }
}
