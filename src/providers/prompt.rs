//! Interactive prompts on the controlling terminal.
use std::cell::RefCell;
use std::io::{self, BufRead, IsTerminal as _, StdinLock, Stdout, Write};

use crate::credentials::MfaPrompt;
use crate::error::AuthError;
use crate::profiles::conflict::{Conflict, ConflictPrompt, Resolution};

/// Attempts at an unrecognised answer before giving up.
const MAX_INVALID_ANSWERS: usize = 3;

/// Line-oriented prompt for MFA codes and conflict decisions.
#[derive(Debug)]
pub struct ConsolePrompt<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
    interactive: bool,
}

impl ConsolePrompt<StdinLock<'static>, Stdout> {
    /// Prompt on stdin/stdout. Conflict questions are declined when stdin is
    /// not a terminal.
    #[must_use]
    pub fn stdio() -> Self {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        Self {
            input: RefCell::new(stdin.lock()),
            output: RefCell::new(io::stdout()),
            interactive,
        }
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    /// Prompt over arbitrary streams.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
            interactive: true,
        }
    }

    /// Print `question` and read one trimmed line. `None` on EOF or I/O error.
    fn ask(&self, question: &str) -> Option<String> {
        {
            let mut out = self.output.borrow_mut();
            write!(out, "{question}").ok()?;
            out.flush().ok()?;
        }
        let mut line = String::new();
        match self.input.borrow_mut().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn say(&self, text: &str) {
        writeln!(self.output.borrow_mut(), "{text}").ok();
    }
}

impl<R: BufRead, W: Write> MfaPrompt for ConsolePrompt<R, W> {
    fn mfa_token(&self, profile_name: &str, serial: &str, attempt: u32) -> Result<String, AuthError> {
        if attempt > 1 {
            self.say("MFA code was rejected.");
        }
        let question = format!("MFA code for {profile_name} ({serial}): ");
        match self.ask(&question) {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(AuthError::Cancelled),
        }
    }
}

impl<R: BufRead, W: Write> ConflictPrompt for ConsolePrompt<R, W> {
    fn choose(&self, conflict: &Conflict) -> Option<Resolution> {
        if !self.interactive {
            return None;
        }
        self.say(&format!(
            "\n{} '{}' already exists with different settings:",
            conflict.category, conflict.name
        ));
        for (key, value) in conflict.existing.iter() {
            match conflict.proposed.get(key) {
                Some(proposed) if proposed == value => {}
                Some(proposed) => self.say(&format!("  {key}: {value} -> {proposed}")),
                None => self.say(&format!("  {key}: {value} -> (unset)")),
            }
        }
        for (key, value) in conflict.proposed.iter() {
            if !conflict.existing.contains_key(key) {
                self.say(&format!("  {key}: (unset) -> {value}"));
            }
        }

        for _ in 0..MAX_INVALID_ANSWERS {
            let answer = self.ask("[s]kip, [r]ename, [c]ustom name, [o]verwrite? ")?;
            match answer.to_lowercase().as_str() {
                "s" | "skip" => return Some(Resolution::Skip),
                "r" | "rename" => return Some(Resolution::AutoRename),
                "o" | "overwrite" => return Some(Resolution::Overwrite),
                "c" | "custom" => return self.custom_name(conflict).map(Resolution::Rename),
                _ => self.say("Please answer s, r, c or o."),
            }
        }
        None
    }

    fn custom_name(&self, conflict: &Conflict) -> Option<String> {
        if !self.interactive {
            return None;
        }
        self.ask(&format!("New name for {} '{}': ", conflict.category, conflict.name))
            .filter(|name| !name.is_empty())
    }
}
