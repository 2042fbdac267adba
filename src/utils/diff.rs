use dissimilar::Chunk;

/// Markers wrapped around inserted and deleted fragments.
#[derive(Debug, Clone, Copy)]
pub struct DiffStyle<'a> {
    pub ins_start: &'a str,
    pub ins_end: &'a str,
    pub del_start: &'a str,
    pub del_end: &'a str,
}

/// The inline styles used in notification emails.
pub const EMAIL_DIFF_STYLE: DiffStyle<'static> = DiffStyle {
    ins_start: r#"<b><u style="background-color:#cfc">"#,
    ins_end: "</u></b>",
    del_start: r#"<del style="color:#600;background-color:#fcc">"#,
    del_end: "</del>",
};

/// Splits HTML into tags, whitespace runs and words.
fn tokenize(html: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = html;
    while let Some(first) = rest.chars().next() {
        let len = if first == '<' {
            rest.find('>').map(|i| i + 1).unwrap_or(rest.len())
        } else {
            let is_space = first.is_whitespace();
            rest.char_indices()
                .find(|&(_, c)| c == '<' || c.is_whitespace() != is_space)
                .map(|(i, _)| i)
                .unwrap_or(rest.len())
        };
        tokens.push(&rest[..len]);
        rest = &rest[len..];
    }
    tokens
}

/// Private-use code point standing for the n-th distinct token.
fn token_char(n: usize) -> char {
    const BMP_PRIVATE: usize = 0xF8FF - 0xE000 + 1;
    let code = if n < BMP_PRIVATE {
        0xE000 + n
    } else {
        0xF0000 + (n - BMP_PRIVATE)
    };
    char::from_u32(code as u32).unwrap_or('\u{FFFD}')
}

fn encode<'a>(tokens: &[&'a str], vocabulary: &mut Vec<&'a str>) -> String {
    tokens
        .iter()
        .map(|t| {
            let n = match vocabulary.iter().position(|v| v == t) {
                Some(n) => n,
                None => {
                    vocabulary.push(*t);
                    vocabulary.len() - 1
                }
            };
            token_char(n)
        })
        .collect()
}

fn decode<'a>(vocabulary: &[&'a str], c: char) -> &'a str {
    let code = c as usize;
    let n = if code >= 0xF0000 {
        code - 0xF0000 + (0xF8FF - 0xE000 + 1)
    } else {
        code - 0xE000
    };
    vocabulary.get(n).copied().unwrap_or("")
}

/// Token-level HTML diff from `old` to `new`.
///
/// Both inputs are expected to be sanitized already. Tags are never split: inserted tags
/// are emitted as-is, deleted tags are dropped, and only text is wrapped in markers.
pub fn html_diff(old: &str, new: &str, style: DiffStyle<'_>) -> String {
    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);

    let mut vocabulary: Vec<&str> = Vec::new();
    let old_encoded = encode(&old_tokens, &mut vocabulary);
    let new_encoded = encode(&new_tokens, &mut vocabulary);

    let mut out = String::with_capacity(new.len() + 64);
    for chunk in dissimilar::diff(&old_encoded, &new_encoded) {
        match chunk {
            Chunk::Equal(text) => {
                text.chars()
                    .for_each(|c| out.push_str(decode(&vocabulary, c)));
            }
            Chunk::Insert(text) => wrap(
                &mut out,
                text.chars().map(|c| decode(&vocabulary, c)),
                style.ins_start,
                style.ins_end,
                true,
            ),
            Chunk::Delete(text) => wrap(
                &mut out,
                text.chars().map(|c| decode(&vocabulary, c)),
                style.del_start,
                style.del_end,
                false,
            ),
        }
    }
    out
}

/// Wraps runs of text tokens in markers; tags are kept (`keep_tags`) or dropped.
fn wrap<'a>(
    out: &mut String,
    tokens: impl Iterator<Item = &'a str>,
    start: &str,
    end: &str,
    keep_tags: bool,
) {
    let mut open = false;
    for token in tokens {
        if token.starts_with('<') {
            if open {
                out.push_str(end);
                open = false;
            }
            if keep_tags {
                out.push_str(token);
            }
        } else {
            if !open {
                out.push_str(start);
                open = true;
            }
            out.push_str(token);
        }
    }
    if open {
        out.push_str(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: DiffStyle<'static> = DiffStyle {
        ins_start: "[+",
        ins_end: "]",
        del_start: "[-",
        del_end: "]",
    };

    #[test]
    fn unchanged_text_has_no_markers() {
        assert_eq!(html_diff("same", "same", PLAIN), "same");
    }

    #[test]
    fn insertions_and_deletions_are_marked() {
        let out = html_diff("hello old world", "hello new world", PLAIN);
        assert!(out.starts_with("hello "));
        assert!(out.contains("[-"));
        assert!(out.contains("[+"));
        assert!(out.ends_with(" world"));
    }

    #[test]
    fn tags_are_never_split() {
        let out = html_diff("<p>old text</p>", "<p>new text</p>", PLAIN);
        assert_eq!(out, "<p>[-old][+new] text</p>");
    }

    #[test]
    fn deleted_tags_are_dropped() {
        let out = html_diff("<p>a</p><p>b</p>", "<p>a</p>", PLAIN);
        assert_eq!(out, "<p>a</p>[-b]");
    }
}
