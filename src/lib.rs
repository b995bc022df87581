//! Echo - an interactive console that lets a language model run code
//!
//! The console holds a running conversation with an Ollama model. When a
//! reply contains a fenced code block in the configured language, the code is
//! shown to the user and, only after an explicit "y", executed. Its captured
//! output is fed back into the conversation as a new turn.
//!
//! # Modules
//!
//! - `conversation` - Append-only turn history
//! - `ollama` - Streaming chat client and the `CompletionBackend` trait
//! - `extract` - Fenced code block extraction
//! - `gate` - User confirmation before execution
//! - `exec` - Code execution capability
//! - `reinject` - Turning execution results into conversation turns
//! - `session` - The read / reply / execute / reinject loop
//! - `console` - Styled console output
//! - `config` - Session configuration from the environment
//! - `metrics` - Prometheus metrics
//!
//! # Quick Start
//!
//! ```ignore
//! use echo_console::{ChatClient, ProcessExecutor, SessionConfig, SessionController};
//! use echo_console::{StdinInput, TerminalSink};
//!
//! let config = SessionConfig::from_env()?;
//! let backend = ChatClient::new(config.base_url.clone());
//! let mut session = SessionController::new(backend, ProcessExecutor::new(), config);
//! session
//!     .run(&mut StdinInput::spawn(), &mut TerminalSink::stdout(), std::future::pending())
//!     .await?;
//! ```

pub mod config;
pub mod console;
pub mod conversation;
pub mod exec;
pub mod extract;
pub mod gate;
pub mod metrics;
pub mod ollama;
pub mod reinject;
pub mod session;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use config::{FollowUp, ReinjectRole, SessionConfig};
pub use console::{CaptureSink, ConsoleSink, Style, TerminalSink};
pub use conversation::{Conversation, Role, Turn};
pub use exec::{Executor, ProcessExecutor};
pub use extract::{CodeFence, ExtractedCode};
pub use gate::{StdinInput, UserInput};
pub use ollama::{ChatClient, CompletionBackend};
pub use reinject::ExecutionOutcome;
pub use session::{SessionController, SessionEnd, SessionError};
