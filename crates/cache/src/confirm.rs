//! Restore confirmation.
//!
//! A cached draft for an already-saved document is only handed back after
//! the user agrees to restore it. The prompt is a port so hosts without a
//! user (batch jobs, tests, non-interactive shells) can say so.

use std::io::{self, BufRead, BufReader, IsTerminal, Stderr, Stdin, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const RESTORE_PROMPT: &str =
    "We've found a previously saved state for this document, would you like to restore it?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accepted,
    Declined,
    /// Nobody can be asked in this runtime.
    Unavailable,
}

/// Asks the user a yes/no question and blocks until they answer.
pub trait ConfirmPort {
    fn confirm(&self, message: &str) -> Confirmation;
}

impl<P: ConfirmPort + ?Sized> ConfirmPort for Arc<P> {
    fn confirm(&self, message: &str) -> Confirmation {
        (**self).confirm(message)
    }
}

impl<P: ConfirmPort + ?Sized> ConfirmPort for Box<P> {
    fn confirm(&self, message: &str) -> Confirmation {
        (**self).confirm(message)
    }
}

/// No interactive user. Every question is unanswerable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl ConfirmPort for NoPrompt {
    fn confirm(&self, _message: &str) -> Confirmation {
        Confirmation::Unavailable
    }
}

/// Gives a fixed answer and counts how often it was asked.
#[derive(Debug)]
pub struct ScriptedPrompt {
    answer: Confirmation,
    asked: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(answer: Confirmation) -> Self {
        Self { answer, asked: AtomicUsize::new(0) }
    }

    pub fn accepting() -> Self {
        Self::new(Confirmation::Accepted)
    }

    pub fn declining() -> Self {
        Self::new(Confirmation::Declined)
    }

    pub fn times_asked(&self) -> usize {
        self.asked.load(Ordering::Acquire)
    }
}

impl ConfirmPort for ScriptedPrompt {
    fn confirm(&self, _message: &str) -> Confirmation {
        self.asked.fetch_add(1, Ordering::AcqRel);
        self.answer
    }
}

/// Line-based yes/no prompt.
///
/// Anything other than `y` or `yes` declines. End of input means there is no
/// one to ask.
pub struct TerminalPrompt<R, W> {
    io: Mutex<(R, W)>,
    interactive: bool,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { io: Mutex::new((reader, writer)), interactive: true }
    }
}

impl TerminalPrompt<BufReader<Stdin>, Stderr> {
    /// Prompt on stderr and read stdin. Unavailable unless stdin is a terminal.
    pub fn stdio() -> Self {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        Self { io: Mutex::new((BufReader::new(stdin), io::stderr())), interactive }
    }
}

impl<R: BufRead, W: Write> ConfirmPort for TerminalPrompt<R, W> {
    fn confirm(&self, message: &str) -> Confirmation {
        if !self.interactive {
            return Confirmation::Unavailable;
        }
        let Ok(mut io) = self.io.lock() else {
            return Confirmation::Unavailable;
        };
        let (reader, writer) = &mut *io;

        if write!(writer, "{message} [y/N] ").and_then(|_| writer.flush()).is_err() {
            return Confirmation::Unavailable;
        }

        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => Confirmation::Unavailable,
            Ok(_) => match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => Confirmation::Accepted,
                _ => Confirmation::Declined,
            },
        }
    }
}
