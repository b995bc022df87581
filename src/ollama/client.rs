//! Ollama API client for streamed chat completions

use std::pin::Pin;

use async_stream::stream;
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::conversation::Turn;

/// Represents a single item from the streaming chat response.
///
/// Ollama sends one JSON object per line. Every line but the last carries a
/// fragment of the reply; the last one (`"done": true`) carries timing and
/// token counts instead.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// A text fragment of the assistant's reply
    Token(String),
    /// The final message containing timing/count metadata
    Done(ChatStats),
}

/// Metadata from the final line of a chat stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatStats {
    /// Number of tokens generated
    pub eval_count: u32,
    /// Number of tokens in the prompt
    pub prompt_eval_count: u32,
    /// Time spent generating tokens (nanoseconds)
    pub eval_duration_ns: u64,
}

/// A reply as a lazy, single-pass sequence of text fragments
pub type FragmentStream<'a> = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send + 'a>>;

/// A model backend that can stream a reply to a conversation
///
/// Each call issues a fresh request; the returned stream is not restartable.
pub trait CompletionBackend {
    fn stream_reply<'a>(&'a self, turns: Vec<Turn>, model: &'a str) -> FragmentStream<'a>;
}

impl<B: CompletionBackend + ?Sized> CompletionBackend for &B {
    fn stream_reply<'a>(&'a self, turns: Vec<Turn>, model: &'a str) -> FragmentStream<'a> {
        (**self).stream_reply(turns, model)
    }
}

/// Error type for chat operations
#[derive(Debug)]
pub enum ChatError {
    Request(reqwest::Error),
    Parse(serde_json::Error),
    /// Non-success HTTP status, with the response body
    Status { status: u16, body: String },
    /// The server reported an error inside the stream
    Backend(String),
    /// The stream ended before the final `done` message
    Truncated,
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::Request(e) => write!(f, "Request error: {}", e),
            ChatError::Parse(e) => write!(f, "Parse error: {}", e),
            ChatError::Status { status, body } => {
                write!(f, "Ollama returned HTTP {}: {}", status, body)
            }
            ChatError::Backend(msg) => write!(f, "Ollama error: {}", msg),
            ChatError::Truncated => write!(f, "Stream ended before the reply was complete"),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::Request(e)
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Parse(e)
    }
}

/// One line of the `/api/chat` stream
#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<LineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    eval_count: u32,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_duration: u64,
}

#[derive(Debug, Deserialize)]
struct LineMessage {
    #[serde(default)]
    content: String,
}

/// Decode one NDJSON line into the chunks it carries
///
/// The final line can carry a last fragment as well as the metadata.
fn parse_line(line: &str) -> Result<Vec<StreamChunk>, ChatError> {
    let data: ChatLine = serde_json::from_str(line)?;
    if let Some(error) = data.error {
        return Err(ChatError::Backend(error));
    }

    let mut chunks = Vec::with_capacity(2);
    if let Some(message) = data.message {
        if !message.content.is_empty() {
            chunks.push(StreamChunk::Token(message.content));
        }
    }
    if data.done {
        chunks.push(StreamChunk::Done(ChatStats {
            eval_count: data.eval_count,
            prompt_eval_count: data.prompt_eval_count,
            eval_duration_ns: data.eval_duration,
        }));
    }
    Ok(chunks)
}

/// Reassembles newline-delimited lines from arbitrarily split byte chunks
#[derive(Debug, Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Feed bytes, returning every line completed by them
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Whatever is left once the byte stream has ended
    fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

/// Client for interacting with Ollama's HTTP API
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Ollama server (e.g., "http://localhost:11434")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send the request and return the body as a byte stream
    async fn open(
        &self,
        turns: &[Turn],
        model: &str,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>, ChatError> {
        let endpoint = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({
                "model": model,
                "messages": turns,
                "stream": true
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes_stream())
    }

    /// Stream a chat completion from Ollama
    ///
    /// # Arguments
    /// * `turns` - The full conversation, oldest first
    /// * `model` - The model name (e.g., "codellama")
    ///
    /// # Returns
    /// A stream of `StreamChunk` items - `Token(String)` for each reply
    /// fragment, then `Done(ChatStats)` once the model has finished. Errors
    /// end the stream.
    pub fn chat_stream<'a>(
        &'a self,
        turns: Vec<Turn>,
        model: &'a str,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk, ChatError>> + Send + 'a>> {
        Box::pin(stream! {
            match self.open(&turns, model).await {
                Err(e) => {
                    yield Err(e);
                }
                Ok(bytes) => {
                    let mut bytes = Box::pin(bytes);
                    let mut decoder = LineDecoder::default();
                    let mut finished = false;

                    'read: while let Some(chunk) = bytes.next().await {
                        let chunk = match chunk {
                            Ok(chunk) => chunk,
                            Err(e) => {
                                yield Err(ChatError::from(e));
                                finished = true;
                                break 'read;
                            }
                        };
                        for line in decoder.push(&chunk) {
                            match parse_line(&line) {
                                Ok(items) => {
                                    for item in items {
                                        let done = matches!(item, StreamChunk::Done(_));
                                        yield Ok(item);
                                        if done {
                                            finished = true;
                                            break 'read;
                                        }
                                    }
                                }
                                Err(e) => {
                                    yield Err(e);
                                    finished = true;
                                    break 'read;
                                }
                            }
                        }
                    }

                    if !finished {
                        // Ollama always ends with a done line; its absence means the
                        // connection dropped, unless the final line lacked a newline.
                        match decoder.finish().map(|line| parse_line(&line)) {
                            Some(Ok(items)) => {
                                let mut saw_done = false;
                                for item in items {
                                    saw_done |= matches!(item, StreamChunk::Done(_));
                                    yield Ok(item);
                                }
                                if !saw_done {
                                    yield Err(ChatError::Truncated);
                                }
                            }
                            Some(Err(e)) => {
                                yield Err(e);
                            }
                            None => {
                                yield Err(ChatError::Truncated);
                            }
                        }
                    }
                }
            }
        })
    }
}

impl CompletionBackend for ChatClient {
    fn stream_reply<'a>(&'a self, turns: Vec<Turn>, model: &'a str) -> FragmentStream<'a> {
        Box::pin(self.chat_stream(turns, model).filter_map(|chunk| async move {
            match chunk {
                Ok(StreamChunk::Token(text)) => Some(Ok(text)),
                Ok(StreamChunk::Done(stats)) => {
                    debug!(
                        eval_count = stats.eval_count,
                        prompt_eval_count = stats.prompt_eval_count,
                        eval_duration_ms = stats.eval_duration_ns as f64 / 1_000_000.0,
                        "Completion finished"
                    );
                    None
                }
                Err(e) => Some(Err(e)),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment_line() {
        let chunks = parse_line(
            r#"{"model":"codellama","message":{"role":"assistant","content":"Hel"},"done":false}"#,
        )
        .unwrap();
        assert_eq!(chunks, vec![StreamChunk::Token("Hel".to_string())]);
    }

    #[test]
    fn test_parse_done_line() {
        let chunks = parse_line(
            r#"{"message":{"role":"assistant","content":""},"done":true,"eval_count":12,"prompt_eval_count":40,"eval_duration":5000000}"#,
        )
        .unwrap();
        assert_eq!(
            chunks,
            vec![StreamChunk::Done(ChatStats {
                eval_count: 12,
                prompt_eval_count: 40,
                eval_duration_ns: 5_000_000,
            })]
        );
    }

    #[test]
    fn test_parse_error_line() {
        let err = parse_line(r#"{"error":"model 'nope' not found"}"#).unwrap_err();
        assert!(matches!(err, ChatError::Backend(ref msg) if msg.contains("not found")));
    }

    #[test]
    fn test_parse_garbage_line() {
        assert!(matches!(parse_line("not json"), Err(ChatError::Parse(_))));
    }

    #[test]
    fn test_line_decoder_reassembles_split_lines() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.push(br#"{"done":"#).is_empty());
        let lines = decoder.push(b"false}\n{\"done\":true}\n{\"par");
        assert_eq!(lines, vec![r#"{"done":false}"#, r#"{"done":true}"#]);
        assert_eq!(decoder.finish().as_deref(), Some(r#"{"par"#));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_line_decoder_keeps_multibyte_chars_intact() {
        let mut decoder = LineDecoder::default();
        let text = "{\"message\":{\"content\":\"é\"}}\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(decoder.push(&text[..split]).is_empty());
        let lines = decoder.push(&text[split..]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains('é'));
    }

    #[tokio::test]
    #[ignore = "Requires Ollama running on localhost:11434"]
    async fn test_stream_reply_live() {
        let client = ChatClient::new("http://localhost:11434");
        let mut stream = client.stream_reply(vec![Turn::user("Say hi")], "llama3.2");
        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            reply.push_str(&fragment.unwrap());
        }
        assert!(!reply.is_empty());
    }
}
