//! REPL loop with rustyline.
//!
//! Interactive mode: prompt, history, TAB completion of command keywords.
//! Script and pipe modes: read lines from a reader, process each.
//! In every mode the literal line `exit` stops input.

use std::io::BufRead;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};
use tracing::warn;

use crate::state::{LineOutcome, SessionState};

const COMMAND_KEYWORDS: &[&str] = &[
    "begin", "beginRO", "R", "W", "end", "dump", "fail", "recover", "exit",
];

/// Run the interactive REPL.
pub fn run_repl(state: &mut SessionState) {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();

    let mut rl: Editor<RepccHelper, _> = match Editor::with_config(config) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("(error) cannot start interactive prompt: {}", e);
            return;
        }
    };
    rl.set_helper(Some(RepccHelper));

    let history_path = history_file();
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    loop {
        let prompt = state.prompt();
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);
                if !emit(state.run_line(trimmed)) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("(error) {:?}", err);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }
}

/// Process every line from `reader` until EOF or `exit`.
///
/// Returns the process exit code: 2 if an internal failure stopped the
/// run, 1 if any line was rejected or input could not be read, else 0.
pub fn run_lines<R: BufRead>(reader: R, state: &mut SessionState) -> i32 {
    let mut exit_code = 0;

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(target: "repcc::cli", error = %e, "Input read failed");
                eprintln!("(error) {}", e);
                return 1;
            }
        };
        match state.run_line(&line) {
            LineOutcome::Exit => break,
            LineOutcome::Error(message) => {
                eprintln!("{}", message);
                exit_code = 1;
            }
            LineOutcome::Fatal(message) => {
                eprintln!("{}", message);
                return 2;
            }
            outcome => {
                emit(outcome);
            }
        }
    }

    exit_code
}

/// Print an outcome. Returns false once input should stop.
fn emit(outcome: LineOutcome) -> bool {
    match outcome {
        LineOutcome::Exit => false,
        LineOutcome::Output(text) => {
            if !text.is_empty() {
                println!("{}", text);
            }
            true
        }
        LineOutcome::Error(message) => {
            eprintln!("{}", message);
            true
        }
        LineOutcome::Fatal(message) => {
            eprintln!("{}", message);
            false
        }
    }
}

fn history_file() -> Option<String> {
    std::env::var("HOME")
        .ok()
        .map(|h| format!("{}/.repcc_history", h))
}

// =========================================================================
// Tab completion
// =========================================================================

struct RepccHelper;

impl Helper for RepccHelper {}
impl Validator for RepccHelper {}
impl Highlighter for RepccHelper {}
impl Hinter for RepccHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Completer for RepccHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let prefix = &line[..pos];
        if prefix.contains(|c: char| !c.is_ascii_alphanumeric()) {
            return Ok((pos, Vec::new()));
        }
        Ok((0, keyword_candidates(prefix)))
    }
}

fn keyword_candidates(prefix: &str) -> Vec<Pair> {
    COMMAND_KEYWORDS
        .iter()
        .filter(|kw| kw.starts_with(prefix))
        .map(|kw| Pair {
            display: kw.to_string(),
            replacement: kw.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use repcc_engine::{Coordinator, OutputFormat};
    use std::io::Cursor;

    fn session() -> SessionState {
        SessionState::new(Coordinator::default(), OutputFormat::Human)
    }

    #[test]
    fn test_keyword_completion() {
        let names: Vec<String> = keyword_candidates("be")
            .into_iter()
            .map(|p| p.replacement)
            .collect();
        assert_eq!(names, vec!["begin", "beginRO"]);
        assert_eq!(keyword_candidates("").len(), COMMAND_KEYWORDS.len());
        assert!(keyword_candidates("q").is_empty());
    }

    #[test]
    fn test_run_lines_stops_at_exit() {
        let mut state = session();
        let script = "begin(T1)\nexit\nbegin(T2)\n";
        assert_eq!(run_lines(Cursor::new(script), &mut state), 0);
        assert_eq!(state.coordinator().clock().as_u64(), 1);
    }

    #[test]
    fn test_emit_stops_on_fatal_only() {
        assert!(emit(LineOutcome::Output(String::new())));
        assert!(emit(LineOutcome::Error("(error) rejected".into())));
        assert!(!emit(LineOutcome::Fatal("(error) invariant violation".into())));
        assert!(!emit(LineOutcome::Exit));
    }

    #[test]
    fn test_run_lines_reports_rejections() {
        let mut state = session();
        let script = "// comment\nbegin(T1)\nbegin(T1)\nend(T1)\n";
        assert_eq!(run_lines(Cursor::new(script), &mut state), 1);
        assert_eq!(state.coordinator().clock().as_u64(), 3);
    }
}
