//! Feeding execution results back into the conversation
//!
//! Whatever the gate produced (captured output or an abort marker) is wrapped
//! in a bare fence with a short instruction asking the model to relate the
//! result to the original question, then appended as a new turn.

use crate::config::ReinjectRole;
use crate::conversation::{Conversation, Turn};

/// Text reinjected when the user declines to run the code
pub const DECLINED_MARKER: &str = "ABORTED: the user chose not to execute the code.";

/// Result of passing through the execution gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The code ran; everything it printed, diagnostics included
    Captured(String),
    /// The user declined; the code never ran
    Declined,
}

impl ExecutionOutcome {
    pub fn text(&self) -> &str {
        match self {
            ExecutionOutcome::Captured(output) => output,
            ExecutionOutcome::Declined => DECLINED_MARKER,
        }
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, ExecutionOutcome::Declined)
    }
}

/// Build the turn that carries an outcome back to the model
pub fn reinjection_turn(outcome: &ExecutionOutcome, role: ReinjectRole) -> Turn {
    let text = outcome.text();
    let newline = if text.is_empty() || text.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    let content = format!(
        "The code returned:\n```\n{}{}```\nWhat does this mean with respect to the question?\n",
        text, newline
    );
    Turn::new(role.as_role(), content)
}

/// Append the outcome turn to the conversation and return it
pub fn reinject<'c>(
    conversation: &'c mut Conversation,
    outcome: &ExecutionOutcome,
    role: ReinjectRole,
) -> &'c Turn {
    conversation.append(reinjection_turn(outcome, role));
    // append never fails, so the tail is the turn just added
    &conversation.turns()[conversation.len() - 1]
}
