//! Fenced code block extraction from model replies
//!
//! Models are asked to wrap executable code in a language-tagged fence:
//!
//! ````text
//! ```python
//! print(2 + 2)
//! ```
//! ````
//!
//! Only the first opening fence for the configured language is considered.
//! If that fence is never closed the reply is treated as containing no code.

const FENCE: &str = "```";

/// Opening/closing fence pair for one executable language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFence {
    language: String,
}

/// Code body found between a fence pair, borrowed from the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedCode<'a> {
    /// Text strictly between the opening and closing fence lines
    pub body: &'a str,
}

impl<'a> ExtractedCode<'a> {
    /// True when the body holds nothing but whitespace
    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }
}

impl CodeFence {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Opening marker, e.g. "```python"
    pub fn opening(&self) -> String {
        format!("{}{}", FENCE, self.language)
    }

    /// Wrap a body back into its fence lines for display
    pub fn wrap(&self, body: &str) -> String {
        let mut out = format!("{}\n{}", self.opening(), body);
        if !body.is_empty() && !body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(FENCE);
        out.push('\n');
        out
    }

    /// Find the first fenced block for this language in `content`
    ///
    /// Returns `None` when there is no opening fence, or when the first
    /// opening fence has no closing fence after it.
    pub fn extract<'a>(&self, content: &'a str) -> Option<ExtractedCode<'a>> {
        let start = self.find_opening(content)?;
        let end = find_closing(content, start)?;
        Some(ExtractedCode {
            body: &content[start..end],
        })
    }

    /// Byte offset just past the first opening fence line
    fn find_opening(&self, content: &str) -> Option<usize> {
        let opening = self.opening();
        for (idx, _) in content.match_indices(&opening) {
            if !at_line_start(content, idx) {
                continue;
            }
            let after = idx + opening.len();
            if let Some(body_start) = line_end_if_blank(content, after) {
                return Some(body_start);
            }
        }
        None
    }
}

/// Byte offset where the first closing fence line at or after `from` begins
fn find_closing(content: &str, from: usize) -> Option<usize> {
    let mut line_start = from;
    loop {
        let rest = &content[line_start..];
        if rest.starts_with(FENCE) {
            let after = line_start + FENCE.len();
            if line_end_if_blank(content, after).is_some() || is_blank_tail(&content[after..]) {
                return Some(line_start);
            }
        }
        let newline = rest.find('\n')?;
        line_start += newline + 1;
        if line_start >= content.len() {
            return None;
        }
    }
}

fn at_line_start(content: &str, idx: usize) -> bool {
    idx == 0 || content.as_bytes()[idx - 1] == b'\n'
}

/// If the rest of the line starting at `from` is only spaces, tabs or a
/// carriage return, the offset of the next line; otherwise `None`.
fn line_end_if_blank(content: &str, from: usize) -> Option<usize> {
    let rest = &content[from..];
    let line_len = rest.find('\n')?;
    is_blank_tail(&rest[..line_len]).then_some(from + line_len + 1)
}

/// Last line of the text holds only spaces, tabs or a carriage return
fn is_blank_tail(rest: &str) -> bool {
    rest.chars().all(|c| c == ' ' || c == '\t' || c == '\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python() -> CodeFence {
        CodeFence::new("python")
    }

    #[test]
    fn test_extracts_body_verbatim() {
        let reply = "Sure:\n```python\nx = 1\n\n  print(x + 1)\n```\nDone.";
        let code = python().extract(reply).unwrap();
        assert_eq!(code.body, "x = 1\n\n  print(x + 1)\n");
    }

    #[test]
    fn test_closing_fence_at_end_of_text() {
        let code = python().extract("```python\nprint(2+2)\n```").unwrap();
        assert_eq!(code.body, "print(2+2)\n");
    }

    #[test]
    fn test_closing_fence_at_end_with_trailing_whitespace() {
        for reply in ["```python\nprint(1)\n``` ", "```python\nprint(1)\n```\t"] {
            let code = python().extract(reply).unwrap();
            assert_eq!(code.body, "print(1)\n");
        }
        let code = python().extract("```python\r\nprint(1)\r\n```\r").unwrap();
        assert_eq!(code.body, "print(1)\r\n");
    }

    #[test]
    fn test_unclosed_fence_is_no_code() {
        assert!(python().extract("```python\nprint('never closed')\n").is_none());
        assert!(python().extract("```python\nprint(1)").is_none());
    }

    #[test]
    fn test_no_opening_fence_is_no_code() {
        assert!(python().extract("just text").is_none());
        assert!(python().extract("").is_none());
        assert!(python().extract("```rust\nfn main() {}\n```\n").is_none());
        assert!(python().extract("```\nplain fence\n```\n").is_none());
    }

    #[test]
    fn test_longer_language_tag_is_not_a_match() {
        assert!(python().extract("```pythonic\nnope\n```\n").is_none());
        let reply = "```python3\nskip\n```\n```python\nkeep\n```\n";
        assert_eq!(python().extract(reply).unwrap().body, "keep\n");
    }

    #[test]
    fn test_first_block_wins() {
        let reply = "```python\nfirst\n```\ntext\n```python\nsecond\n```\n";
        assert_eq!(python().extract(reply).unwrap().body, "first\n");
    }

    #[test]
    fn test_first_unclosed_opening_does_not_fall_through() {
        let reply = "```python\nfirst\n```python\nsecond\n";
        assert!(python().extract(reply).is_none());
    }

    #[test]
    fn test_closing_before_opening_is_ignored() {
        let reply = "```\nstray\n```python\nprint(1)\n```\n";
        assert_eq!(python().extract(reply).unwrap().body, "print(1)\n");
    }

    #[test]
    fn test_inline_backticks_are_not_a_closing_fence() {
        let reply = "```python\ns = '```'\nprint(s)\n```\n";
        assert_eq!(python().extract(reply).unwrap().body, "s = '```'\nprint(s)\n");
    }

    #[test]
    fn test_crlf_fences() {
        let reply = "```python\r\nprint(1)\r\n```\r\n";
        assert_eq!(python().extract(reply).unwrap().body, "print(1)\r\n");
    }

    #[test]
    fn test_empty_block_is_blank() {
        let code = python().extract("```python\n```\n").unwrap();
        assert_eq!(code.body, "");
        assert!(code.is_blank());
    }

    #[test]
    fn test_extraction_does_not_consume_reply() {
        let reply = String::from("```python\nprint(1)\n```\n");
        let fence = python();
        let first = fence.extract(&reply).unwrap().body.to_string();
        let second = fence.extract(&reply).unwrap().body.to_string();
        assert_eq!(first, second);
        assert_eq!(reply, "```python\nprint(1)\n```\n");
    }

    #[test]
    fn test_wrap() {
        assert_eq!(python().wrap("print(1)\n"), "```python\nprint(1)\n```\n");
        assert_eq!(python().wrap("print(1)"), "```python\nprint(1)\n```\n");
    }
}
