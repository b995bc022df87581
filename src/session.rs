//! Session loop - the read / reply / execute / reinject cycle
//!
//! ```text
//! AwaitUserInput → append user turn → stream reply → extract code
//!        ▲                                              │
//!        │                        no code ◀─────────────┤
//!        │                                              ▼
//!        └──── follow-up policy ◀── reinject ◀── execution gate
//! ```
//!
//! Everything runs on one task. The conversation is owned by the
//! [`SessionController`] and only touched between awaits of that task, so it
//! needs no locking.

use std::future::Future;
use std::io;
use std::time::Instant;

use futures_util::StreamExt;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{FollowUp, SessionConfig};
use crate::console::{ConsoleSink, Style};
use crate::conversation::{Conversation, Turn};
use crate::exec::Executor;
use crate::extract::CodeFence;
use crate::gate::{ExecutionGate, UserInput};
use crate::metrics::{BACKEND_ERRORS, CODE_BLOCKS_DETECTED, LLM_CALL_TIME};
use crate::ollama::{ChatError, CompletionBackend};
use crate::reinject::reinject;

/// How a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The interrupt signal fired
    Interrupted,
    /// Standard input was closed
    EndOfInput,
}

/// Error type for session operations
#[derive(Debug)]
pub enum SessionError {
    /// The completion stream failed; the partial reply was kept as an assistant turn
    Backend {
        source: ChatError,
        partial_len: usize,
    },
    /// Reading user input or writing to the console failed
    Io(io::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Backend {
                source,
                partial_len,
            } => write!(
                f,
                "Completion failed after {} bytes of reply: {}",
                partial_len, source
            ),
            SessionError::Io(e) => write!(f, "Console I/O error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Backend { source, .. } => Some(source),
            SessionError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        SessionError::Io(e)
    }
}

/// Outcome of one pass through the loop
enum Step {
    Continue,
    EndOfInput,
}

/// Owns the conversation and drives it against a backend and an executor
pub struct SessionController<B, E> {
    backend: B,
    executor: E,
    config: SessionConfig,
    fence: CodeFence,
    conversation: Conversation,
    session_id: String,
}

impl<B, E> SessionController<B, E>
where
    B: CompletionBackend,
    E: Executor,
{
    /// Create a controller whose conversation holds only the system prompt
    pub fn new(backend: B, executor: E, config: SessionConfig) -> Self {
        let fence = CodeFence::new(config.language.clone());
        let conversation = Conversation::new(config.system_prompt());
        Self {
            backend,
            executor,
            config,
            fence,
            conversation,
            session_id: Uuid::now_v7().to_string(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Run the session until `interrupt` resolves or input ends
    ///
    /// Whatever the loop is waiting on when `interrupt` fires (user input, the
    /// model stream, the gate prompt or a running fragment) is abandoned.
    pub async fn run<I, S, F>(
        &mut self,
        input: &mut I,
        sink: &mut S,
        interrupt: F,
    ) -> Result<SessionEnd, SessionError>
    where
        I: UserInput,
        S: ConsoleSink,
        F: Future<Output = ()>,
    {
        let root_span = info_span!(
            "session",
            session_id = %self.session_id,
            model = %self.config.model,
            language = %self.config.language,
        );

        self.run_loop(input, sink, interrupt)
            .instrument(root_span)
            .await
    }

    async fn run_loop<I, S, F>(
        &mut self,
        input: &mut I,
        sink: &mut S,
        interrupt: F,
    ) -> Result<SessionEnd, SessionError>
    where
        I: UserInput,
        S: ConsoleSink,
        F: Future<Output = ()>,
    {
        info!(base_url = %self.config.base_url, "Session started");
        sink.write("Welcome to Echo!\n\n", Style::Banner)?;

        tokio::pin!(interrupt);
        let end = loop {
            tokio::select! {
                biased;
                _ = &mut interrupt => break SessionEnd::Interrupted,
                step = self.step(input, sink) => match step? {
                    Step::Continue => {}
                    Step::EndOfInput => break SessionEnd::EndOfInput,
                },
            }
        };

        info!(end = ?end, turns = self.conversation.len(), "Session ended");
        sink.write("\n\nGoodbye!\n", Style::Banner)?;
        Ok(end)
    }

    /// One outer iteration: prompt, read, reply
    async fn step<I, S>(&mut self, input: &mut I, sink: &mut S) -> Result<Step, SessionError>
    where
        I: UserInput,
        S: ConsoleSink,
    {
        sink.write("> ", Style::Prompt)?;
        let Some(line) = input.read_line().await? else {
            return Ok(Step::EndOfInput);
        };
        self.conversation.append(Turn::user(line));
        self.respond(input, sink).await
    }

    /// Stream a reply to the current conversation and handle any code in it
    async fn respond<I, S>(&mut self, input: &mut I, sink: &mut S) -> Result<Step, SessionError>
    where
        I: UserInput,
        S: ConsoleSink,
    {
        let mut gate_rounds = 0;

        loop {
            let reply = self.stream_reply(sink).await?;

            let Some(code) = self.fence.extract(&reply).filter(|code| !code.is_blank()) else {
                return Ok(Step::Continue);
            };
            CODE_BLOCKS_DETECTED
                .with_label_values(&[self.fence.language()])
                .inc();
            gate_rounds += 1;

            let mut gate = ExecutionGate::new(&self.fence);
            let Some(outcome) = gate
                .run(code.body, input, &self.executor, sink)
                .await?
            else {
                return Ok(Step::EndOfInput);
            };

            let turn = reinject(&mut self.conversation, &outcome, self.config.reinject_role);
            sink.write(&turn.content, Style::AlertBold)?;

            if outcome.is_declined() {
                return Ok(Step::Continue);
            }

            match self.config.follow_up {
                FollowUp::AwaitUser => return Ok(Step::Continue),
                FollowUp::Explain => {
                    self.stream_reply(sink).await?;
                    return Ok(Step::Continue);
                }
                FollowUp::Loop if gate_rounds > self.config.max_follow_ups => {
                    info!(gate_rounds, "Follow-up limit reached; explaining without executing");
                    self.stream_reply(sink).await?;
                    return Ok(Step::Continue);
                }
                FollowUp::Loop => {}
            }
        }
    }

    /// Stream one assistant reply, echoing fragments as they arrive
    ///
    /// The reply is appended as an assistant turn. If the stream fails, the
    /// text received so far is appended before the error is returned.
    async fn stream_reply<S: ConsoleSink>(&mut self, sink: &mut S) -> Result<String, SessionError> {
        sink.write("echo: ", Style::Prompt)?;

        let llm_span = info_span!(
            "llm_call",
            model = %self.config.model,
            turns = self.conversation.len(),
        );
        let call_start = Instant::now();

        let turns = self.conversation.snapshot();
        let backend = &self.backend;
        let model = self.config.model.as_str();
        let (reply, failure) = async {
            let mut stream = backend.stream_reply(turns, model);
            let mut reply = String::new();
            while let Some(fragment) = stream.next().await {
                match fragment {
                    Ok(text) => {
                        sink.write(&text, Style::Reply)?;
                        reply.push_str(&text);
                    }
                    Err(e) => return Ok::<_, io::Error>((reply, Some(e))),
                }
            }
            Ok::<_, io::Error>((reply, None))
        }
        .instrument(llm_span)
        .await?;

        sink.write("\n", Style::Reply)?;
        let call_duration_secs = call_start.elapsed().as_secs_f64();
        LLM_CALL_TIME
            .with_label_values(&[&self.config.model])
            .observe(call_duration_secs);

        match failure {
            None => {
                info!(reply_len = reply.len(), duration_secs = call_duration_secs, "Reply complete");
                self.conversation.append(Turn::assistant(reply.clone()));
                Ok(reply)
            }
            Some(source) => {
                BACKEND_ERRORS
                    .with_label_values(&[&self.config.model])
                    .inc();
                warn!(error = %source, partial_len = reply.len(), "Completion stream failed");
                let partial_len = reply.len();
                if !reply.is_empty() {
                    self.conversation.append(Turn::assistant(reply));
                }
                Err(SessionError::Backend {
                    source,
                    partial_len,
                })
            }
        }
    }
}
