//! Ollama LLM integration module
//!
//! This module provides a streaming client for Ollama's `/api/chat`
//! endpoint and the [`CompletionBackend`] trait the session is written
//! against, so any other backend (or a scripted one in tests) can stand in.

pub mod client;

// Re-export public types from the client module
pub use client::{
    ChatClient, ChatError, ChatStats, CompletionBackend, FragmentStream, StreamChunk,
};
