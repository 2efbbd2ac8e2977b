//! Prompt sessions.
//!
//! All interactive input goes through an explicit [`PromptSession`] handle
//! passed into the resolver; there is no global input stream. One
//! [`PromptSession::ask`] call spans exactly one prompt's lifetime.
//!
//! [`TerminalSession`] drives a real terminal; [`ScriptedSession`] replays
//! queued answers and captures every request, for tests and
//! non-interactive runs.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use crate::error::{EngineError, EngineResult};

/// One prompt put to the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptRequest {
    /// Free-form text input.
    Input {
        name: String,
        message: String,
        default: Option<String>,
        secret: bool,
    },
    /// Yes/no confirmation.
    Confirm {
        name: String,
        message: String,
        default: bool,
    },
    /// Selection from a fixed option list.
    Select {
        name: String,
        message: String,
        options: Vec<String>,
    },
}

impl PromptRequest {
    /// The variable name this prompt resolves.
    pub fn name(&self) -> &str {
        match self {
            Self::Input { name, .. } | Self::Confirm { name, .. } | Self::Select { name, .. } => {
                name
            }
        }
    }
}

/// Answer produced by a session for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptAnswer {
    Text(String),
    Flag(bool),
    Index(usize),
}

/// Interactive input collaborator for one task run.
pub trait PromptSession: Send {
    /// Put one prompt to the operator and return its answer.
    fn ask(&mut self, request: &PromptRequest) -> EngineResult<PromptAnswer>;
}

/// Session over a terminal's input and output streams.
pub struct TerminalSession<R, W> {
    input: R,
    output: W,
}

impl TerminalSession<std::io::Stdin, std::io::Stderr> {
    /// Session over the process stdin/stderr.
    ///
    /// Prompts go to stderr so generated output can be piped. The input
    /// handle is locked for exactly one prompt at a time.
    pub fn stdio() -> Self {
        Self {
            input: std::io::stdin(),
            output: std::io::stderr(),
        }
    }
}

impl<R: BufRead, W: Write> TerminalSession<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> EngineResult<String> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        if read == 0 {
            return Err(EngineError::Session("input stream closed".to_string()));
        }
        Ok(line)
    }

    fn ask_buffered(&mut self, request: &PromptRequest) -> EngineResult<PromptAnswer> {
        match request {
            PromptRequest::Input {
                message, default, ..
            } => {
                match default {
                    Some(default) if !default.is_empty() => {
                        write!(self.output, "\u{203a} {message} ({default}) ")?;
                    }
                    _ => write!(self.output, "\u{203a} {message} ")?,
                }
                self.output.flush()?;
                let line = self.read_line()?;
                let line = line.trim();
                if line.is_empty() {
                    Ok(PromptAnswer::Text(default.clone().unwrap_or_default()))
                } else {
                    Ok(PromptAnswer::Text(line.to_string()))
                }
            }
            PromptRequest::Confirm {
                message, default, ..
            } => {
                let hint = if *default { "[Y/n]" } else { "[y/N]" };
                write!(self.output, "\u{203a} {message} {hint} ")?;
                self.output.flush()?;
                let line = self.read_line()?;
                Ok(PromptAnswer::Flag(match line.trim() {
                    "" => *default,
                    "y" | "Y" | "yes" => true,
                    _ => false,
                }))
            }
            PromptRequest::Select {
                message, options, ..
            } => {
                writeln!(self.output, "\u{203a} {message}")?;
                for (i, option) in options.iter().enumerate() {
                    writeln!(self.output, "  {}) {option}", i + 1)?;
                }
                loop {
                    write!(self.output, "  choice [1-{}]: ", options.len())?;
                    self.output.flush()?;
                    let line = self.read_line()?;
                    let line = line.trim();
                    if let Ok(n) = line.parse::<usize>() {
                        if n >= 1 && n <= options.len() {
                            return Ok(PromptAnswer::Index(n - 1));
                        }
                    }
                    if let Some(i) = options.iter().position(|o| o == line) {
                        return Ok(PromptAnswer::Index(i));
                    }
                }
            }
        }
    }
}

// SCOUT-TEMP-REMOVED impl1


impl PromptSession for TerminalSession<std::io::Stdin, std::io::Stderr> {
    fn ask(&mut self, request: &PromptRequest) -> EngineResult<PromptAnswer> {
        // lock spans exactly this one prompt
        let mut locked = TerminalSession::new(self.input.lock(), std::io::stderr());
        locked.ask_buffered(request)
    }
}

/// Scripted session replaying queued answers.
///
/// Every request is captured for later assertion; asking past the end of
/// the script is an error, and a finished run should leave the queue
/// empty.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    answers: VecDeque<PromptAnswer>,
    requests: Vec<PromptRequest>,
}

impl ScriptedSession {
    pub fn new(answers: impl IntoIterator<Item = PromptAnswer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            requests: Vec::new(),
        }
    }

    /// Queue a text answer.
    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.answers.push_back(PromptAnswer::Text(value.into()));
        self
    }

    /// Queue a confirmation answer.
    pub fn flag(mut self, value: bool) -> Self {
        self.answers.push_back(PromptAnswer::Flag(value));
        self
    }

    /// Queue a selection answer.
    pub fn index(mut self, value: usize) -> Self {
        self.answers.push_back(PromptAnswer::Index(value));
        self
    }

    /// Requests captured so far, in order.
    pub fn requests(&self) -> &[PromptRequest] {
        &self.requests
    }

    /// Number of unconsumed scripted answers.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    /// Whether every scripted answer was consumed.
    pub fn is_drained(&self) -> bool {
        self.answers.is_empty()
    }
}

impl PromptSession for ScriptedSession {
    fn ask(&mut self, request: &PromptRequest) -> EngineResult<PromptAnswer> {
        self.requests.push(request.clone());
        self.answers.pop_front().ok_or_else(|| {
            EngineError::Session(format!(
                "no scripted answer left for prompt '{}'",
                request.name()
            ))
        })
    }
}
