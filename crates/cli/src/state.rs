//! Session wrapper around the coordinator.
//!
//! Holds the simulator and the output mode, and renders each processed
//! line so that file, pipe and interactive input share one code path.

use repcc_core::Result;
use repcc_engine::{Coordinator, Event, OutputFormat};
use tracing::error;

use crate::format::{format_error, format_events};

/// What a line of input produced, already rendered.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// The literal `exit` command
    Exit,
    /// Rendered events; may be empty
    Output(String),
    /// Rendered rejection; later input is still processed
    Error(String),
    /// Rendered internal failure; input stops
    Fatal(String),
}

/// Wraps the coordinator and tracks the output mode.
pub struct SessionState {
    coordinator: Coordinator,
    mode: OutputFormat,
}

impl SessionState {
    /// Create a session over `coordinator`.
    pub fn new(coordinator: Coordinator, mode: OutputFormat) -> Self {
        Self { coordinator, mode }
    }

    /// Process one line of input.
    pub fn execute(&mut self, line: &str) -> Result<Vec<Event>> {
        self.coordinator.process_line(line)
    }

    /// Process one line and render the result.
    pub fn run_line(&mut self, line: &str) -> LineOutcome {
        if line.trim() == "exit" {
            return LineOutcome::Exit;
        }
        let result = self.execute(line);
        self.render(result)
    }

    fn render(&self, result: Result<Vec<Event>>) -> LineOutcome {
        match result {
            Ok(events) => LineOutcome::Output(format_events(&events, self.mode)),
            Err(e) if e.is_protocol_violation() => LineOutcome::Error(format_error(&e, self.mode)),
            Err(e) => {
                error!(target: "repcc::cli", error = %e, "Simulation halted");
                LineOutcome::Fatal(format_error(&e, self.mode))
            }
        }
    }

    /// Interactive prompt showing the logical clock.
    pub fn prompt(&self) -> String {
        format!("repcc[t={}]> ", self.coordinator.clock())
    }

    /// The simulator.
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repcc_core::{Error, SiteId};

    fn session() -> SessionState {
        SessionState::new(Coordinator::default(), OutputFormat::Human)
    }

    #[test]
    fn test_exit_is_recognized() {
        let mut state = session();
        assert_eq!(state.run_line("exit"), LineOutcome::Exit);
        assert_eq!(state.run_line("  exit  "), LineOutcome::Exit);
    }

    #[test]
    fn test_run_line_renders_events() {
        let mut state = session();
        assert_eq!(
            state.run_line("begin(T1)"),
            LineOutcome::Output("T1 begins".to_string())
        );
        assert_eq!(
            state.run_line("R(T1,x4)"),
            LineOutcome::Output("T1 reads x4: 40 (site 1)".to_string())
        );
    }

    #[test]
    fn test_run_line_renders_errors() {
        let mut state = session();
        assert_eq!(
            state.run_line("end(T1)"),
            LineOutcome::Error("(error) transaction T1 not found".to_string())
        );
    }

    #[test]
    fn test_broken_invariant_is_fatal() {
        let state = session();
        let outcome = state.render(Err(Error::InvariantViolation("lock lost".into())));
        assert_eq!(
            outcome,
            LineOutcome::Fatal("(error) invariant violation: lock lost".to_string())
        );
        assert!(matches!(
            state.render(Err(Error::SiteAlreadyUp(SiteId::new(2)))),
            LineOutcome::Error(_)
        ));
    }

    #[test]
    fn test_prompt_tracks_clock() {
        let mut state = session();
        assert_eq!(state.prompt(), "repcc[t=0]> ");
        state.run_line("dump()");
        assert_eq!(state.prompt(), "repcc[t=1]> ");
        assert_eq!(state.coordinator().clock().as_u64(), 1);
    }
}
