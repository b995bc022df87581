//! Execution gate: nothing runs without the user saying yes
//!
//! ```text
//! Idle ──present──▶ Presented ──"y"/"Y"──▶ Approved   (code runs)
//!                            └──anything──▶ Declined   (code never runs)
//! ```
//!
//! The gate blocks on the user's answer with no timeout and never retries.

use std::future::Future;
use std::io::{self, BufRead};

use tokio::sync::mpsc;
use tracing::{info, info_span, Instrument};

use crate::console::{ConsoleSink, Style};
use crate::exec::Executor;
use crate::extract::CodeFence;
use crate::metrics::GATE_DECISIONS;
use crate::reinject::ExecutionOutcome;

/// Line-oriented source of user answers and messages
pub trait UserInput {
    /// Next line without its line terminator, or `None` once input has ended
    fn read_line(&mut self) -> impl Future<Output = io::Result<Option<String>>>;
}

impl<U: UserInput> UserInput for &mut U {
    fn read_line(&mut self) -> impl Future<Output = io::Result<Option<String>>> {
        (**self).read_line()
    }
}

/// User input read from the process's standard input
///
/// Lines are read on a dedicated thread and handed over through a channel,
/// so an abandoned `read_line` never loses a line or blocks shutdown.
pub struct StdinInput {
    lines: mpsc::Receiver<io::Result<String>>,
}

impl StdinInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(16);
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        });
        Self { lines: rx }
    }
}

impl UserInput for StdinInput {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.lines.recv().await.transpose()
    }
}

/// Where the gate is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Presented,
    Approved,
    Declined,
}

/// The user's answer to the execute prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
}

impl Decision {
    /// Only a lone "y" (any case) approves
    pub fn from_answer(answer: &str) -> Self {
        if answer.trim().eq_ignore_ascii_case("y") {
            Decision::Approve
        } else {
            Decision::Decline
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Decline => "declined",
        }
    }
}

/// Single-use confirmation checkpoint for one extracted code body
pub struct ExecutionGate<'f> {
    fence: &'f CodeFence,
    state: GateState,
}

impl<'f> ExecutionGate<'f> {
    pub fn new(fence: &'f CodeFence) -> Self {
        Self {
            fence,
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Show the detected code and the y/n prompt
    pub fn present<S: ConsoleSink>(&mut self, code: &str, sink: &mut S) -> io::Result<()> {
        debug_assert_eq!(self.state, GateState::Idle);
        let language = self.fence.language().to_uppercase();
        sink.write(&format!("\n{} CODE DETECTED\n", language), Style::AlertBold)?;
        sink.write(&format!("{}\n", self.fence.wrap(code)), Style::Alert)?;
        sink.write("EXECUTE CODE? (y/n): ", Style::AlertBold)?;
        self.state = GateState::Presented;
        Ok(())
    }

    /// Record the user's answer
    pub fn decide(&mut self, answer: &str) -> Decision {
        debug_assert_eq!(self.state, GateState::Presented);
        let decision = Decision::from_answer(answer);
        self.state = match decision {
            Decision::Approve => GateState::Approved,
            Decision::Decline => GateState::Declined,
        };
        GATE_DECISIONS
            .with_label_values(&[self.fence.language(), decision.label()])
            .inc();
        info!(language = self.fence.language(), decision = decision.label(), "Gate decision");
        decision
    }

    /// Present `code`, wait for the answer and run the code if approved
    ///
    /// Returns `None` if input ends before the user answers.
    pub async fn run<I, E, S>(
        &mut self,
        code: &str,
        input: &mut I,
        executor: &E,
        sink: &mut S,
    ) -> io::Result<Option<ExecutionOutcome>>
    where
        I: UserInput,
        E: Executor,
        S: ConsoleSink,
    {
        self.present(code, sink)?;

        let Some(answer) = input.read_line().await? else {
            return Ok(None);
        };

        match self.decide(&answer) {
            Decision::Approve => {
                sink.write("EXECUTING CODE...\n", Style::AlertBold)?;
                let exec_span = info_span!(
                    "code_execution",
                    language = %self.fence.language(),
                    code_len = code.len(),
                );
                let output = executor
                    .execute(self.fence.language(), code)
                    .instrument(exec_span)
                    .await;
                Ok(Some(ExecutionOutcome::Captured(output)))
            }
            Decision::Decline => Ok(Some(ExecutionOutcome::Declined)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::CaptureSink;
    use std::cell::Cell;
    use std::collections::VecDeque;

    struct Answers(VecDeque<String>);

    impl UserInput for Answers {
        async fn read_line(&mut self) -> io::Result<Option<String>> {
            Ok(self.0.pop_front())
        }
    }

    fn answers(lines: &[&str]) -> Answers {
        Answers(lines.iter().map(|l| l.to_string()).collect())
    }

    #[derive(Default)]
    struct CountingExecutor {
        calls: Cell<usize>,
    }

    impl Executor for CountingExecutor {
        async fn execute(&self, _language: &str, code: &str) -> String {
            self.calls.set(self.calls.get() + 1);
            format!("ran {}", code.len())
        }
    }

    #[test]
    fn test_decision_from_answer() {
        assert_eq!(Decision::from_answer("y"), Decision::Approve);
        assert_eq!(Decision::from_answer("Y"), Decision::Approve);
        assert_eq!(Decision::from_answer(" y "), Decision::Approve);
        assert_eq!(Decision::from_answer("yes"), Decision::Decline);
        assert_eq!(Decision::from_answer("n"), Decision::Decline);
        assert_eq!(Decision::from_answer(""), Decision::Decline);
    }

    #[tokio::test]
    async fn test_approve_runs_code() {
        let fence = CodeFence::new("python");
        let mut gate = ExecutionGate::new(&fence);
        let executor = CountingExecutor::default();
        let mut sink = CaptureSink::new();

        let outcome = gate
            .run("print(1)\n", &mut answers(&["Y"]), &executor, &mut sink)
            .await
            .unwrap();

        assert_eq!(outcome, Some(ExecutionOutcome::Captured("ran 9".into())));
        assert_eq!(executor.calls.get(), 1);
        assert_eq!(gate.state(), GateState::Approved);

        let shown = sink.text();
        assert!(shown.contains("PYTHON CODE DETECTED"));
        assert!(shown.contains("```python\nprint(1)\n```\n"));
        assert!(shown.contains("EXECUTE CODE? (y/n): "));
        assert!(shown.contains("EXECUTING CODE..."));
    }

    #[tokio::test]
    async fn test_decline_never_executes() {
        let fence = CodeFence::new("python");
        let executor = CountingExecutor::default();

        for answer in ["n", "no", "yes", "", "maybe"] {
            let mut gate = ExecutionGate::new(&fence);
            let mut sink = CaptureSink::new();
            let outcome = gate
                .run("import os\n", &mut answers(&[answer]), &executor, &mut sink)
                .await
                .unwrap();
            assert_eq!(outcome, Some(ExecutionOutcome::Declined));
            assert_eq!(gate.state(), GateState::Declined);
            assert!(!sink.text().contains("EXECUTING"));
        }
        assert_eq!(executor.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_end_of_input_at_prompt() {
        let fence = CodeFence::new("sh");
        let mut gate = ExecutionGate::new(&fence);
        let executor = CountingExecutor::default();
        let mut sink = CaptureSink::new();

        let outcome = gate
            .run("ls\n", &mut answers(&[]), &executor, &mut sink)
            .await
            .unwrap();
        assert_eq!(outcome, None);
        assert_eq!(gate.state(), GateState::Presented);
        assert_eq!(executor.calls.get(), 0);
    }
}
