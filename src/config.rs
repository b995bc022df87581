//! Session configuration
//!
//! Defaults reproduce a local Ollama setup running `codellama`. Every field
//! can be overridden through `ECHO_*` environment variables.

use std::str::FromStr;

use crate::conversation::Role;

/// Role given to the turn that carries execution results back to the model
///
/// The role changes how the backend weighs the result on later completions:
/// - `User`: the result reads as new input the model must answer. Models
///   reliably respond to it, but it can be mistaken for something the human
///   typed.
/// - `Assistant`: the result reads as the model's own earlier output. Keeps
///   the human's voice clean, but some models treat it as already handled and
///   say little about it.
/// - `System`: the result reads as an instruction from the operator. Strongly
///   weighted; some backends only honour a leading system turn and may ignore
///   or reject later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReinjectRole {
    #[default]
    User,
    Assistant,
    System,
}

impl ReinjectRole {
    pub fn as_role(&self) -> Role {
        match self {
            ReinjectRole::User => Role::User,
            ReinjectRole::Assistant => Role::Assistant,
            ReinjectRole::System => Role::System,
        }
    }
}

impl FromStr for ReinjectRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(ReinjectRole::User),
            "assistant" => Ok(ReinjectRole::Assistant),
            "system" => Ok(ReinjectRole::System),
            _ => Err(ConfigError::Invalid {
                key: "ECHO_REINJECT_ROLE",
                value: s.to_string(),
                expected: "user, assistant or system",
            }),
        }
    }
}

/// What the session does after reinjecting an execution result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowUp {
    /// Go straight back to the user prompt
    #[default]
    AwaitUser,
    /// Stream one reply interpreting the result; code in it is not run
    Explain,
    /// Stream a reply and gate any code in it again, up to `max_follow_ups` rounds
    Loop,
}

impl FromStr for FollowUp {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "await_user" | "await" | "none" => Ok(FollowUp::AwaitUser),
            "explain" => Ok(FollowUp::Explain),
            "loop" => Ok(FollowUp::Loop),
            _ => Err(ConfigError::Invalid {
                key: "ECHO_FOLLOW_UP",
                value: s.to_string(),
                expected: "await_user, explain or loop",
            }),
        }
    }
}

/// Configuration for a console session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the Ollama server
    pub base_url: String,
    /// Model to chat with (e.g., "codellama")
    pub model: String,
    /// Language tag of executable fences (e.g., "python")
    pub language: String,
    /// Custom system prompt (uses [`default_system_prompt`] if None)
    pub system_prompt: Option<String>,
    pub reinject_role: ReinjectRole,
    pub follow_up: FollowUp,
    /// Upper bound on gate rounds per user message in [`FollowUp::Loop`]
    pub max_follow_ups: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "codellama".to_string(),
            language: "python".to_string(),
            system_prompt: None,
            reinject_role: ReinjectRole::default(),
            follow_up: FollowUp::default(),
            max_follow_ups: 3,
        }
    }
}

impl SessionConfig {
    /// Defaults overlaid with `ECHO_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ECHO_API_BASE") {
            config.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("ECHO_MODEL") {
            config.model = v;
        }
        if let Some(v) = get("ECHO_LANGUAGE") {
            config.language = v.trim().to_string();
        }
        if let Some(v) = get("ECHO_SYSTEM_PROMPT") {
            config.system_prompt = Some(v);
        }
        if let Some(v) = get("ECHO_REINJECT_ROLE") {
            config.reinject_role = v.parse()?;
        }
        if let Some(v) = get("ECHO_FOLLOW_UP") {
            config.follow_up = v.parse()?;
        }
        if let Some(v) = get("ECHO_MAX_FOLLOW_UPS") {
            config.max_follow_ups = v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "ECHO_MAX_FOLLOW_UPS",
                value: v.clone(),
                expected: "a non-negative integer",
            })?;
        }

        Ok(config)
    }

    /// The system prompt the conversation starts with
    pub fn system_prompt(&self) -> String {
        self.system_prompt
            .clone()
            .unwrap_or_else(|| default_system_prompt(&self.language))
    }
}

/// Default system prompt for the given fence language
pub fn default_system_prompt(language: &str) -> String {
    format!(
        r#"Your name is Echo.

To better answer questions you are equipped with the ability to generate
and execute {language} code. The user will decide whether to execute the code.

The code has to be given in markdown code blocks of the form:

```{language}
# code goes here
```

Only write {language} code if you want to execute it.
Make your answer as brief as possible.
Unless absolutely necessary say nothing else than the code.
"#
    )
}

/// Error type for configuration loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid {
                key,
                value,
                expected,
            } => write!(f, "Invalid {}={:?}: expected {}", key, value, expected),
        }
    }
}

impl std::error::Error for ConfigError {}
