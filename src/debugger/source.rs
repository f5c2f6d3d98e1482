use std::io::{self, BufRead, IsTerminal, Write};

use console::Key;

use crate::dprintln;

/// Where debugger commands come from.
#[derive(Debug)]
pub enum CommandSource {
    Argument(Argument),
    Stdin(Stdin),
    Terminal(Terminal),
}

/// Stdin which is not attached to a terminal, i.e. piped.
#[derive(Debug)]
pub struct Stdin {
    stdin: io::StdinLock<'static>,
    /// Commands left over from the last line read
    pending: Vec<String>,
}

/// Command-line argument.
#[derive(Debug)]
pub struct Argument {
    buffer: String,
    /// Byte index
    cursor: usize,
}

/// Interactive unbuffered terminal.
#[derive(Debug)]
pub struct Terminal {
    term: console::Term,
    buffer: String,
    pending: Vec<String>,

    history: Vec<String>,
    /// Focused item in history, or new entry if index==length
    history_index: usize,
    /// Visible line cursor in terminal
    visible_cursor: usize,
}

pub trait SourceRead {
    /// `None` indicates EOF.
    /// Returned string MAY include leading or trailing whitespace.
    fn read(&mut self) -> Option<String>;
}

impl From<Option<String>> for CommandSource {
    fn from(argument: Option<String>) -> Self {
        if let Some(argument) = argument {
            return Self::Argument(Argument::from(argument));
        }
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return Self::Terminal(Terminal::new());
        }
        Self::Stdin(Stdin::from(stdin))
    }
}

impl SourceRead for CommandSource {
    fn read(&mut self) -> Option<String> {
        let command = match self {
            Self::Argument(argument) => argument.read(),
            Self::Stdin(stdin) => stdin.read(),
            Self::Terminal(terminal) => return terminal.read(),
        };
        // Echo prompt and command for non-terminal source
        dprintln!(Sometimes, "\x1b[1mCommand: \x1b[0m{}", command.as_deref().unwrap_or("").trim());
        command
    }
}

impl From<String> for Argument {
    fn from(buffer: String) -> Self {
        Self { buffer, cursor: 0 }
    }
}

impl SourceRead for Argument {
    fn read(&mut self) -> Option<String> {
        let rest = self.buffer.get(self.cursor..).filter(|rest| !rest.is_empty())?;
        let end = rest.find(['\n', ';']).unwrap_or(rest.len());
        let command = rest[..end].to_string();
        // Skip the delimiter too
        self.cursor += end + 1;
        Some(command)
    }
}

impl From<io::Stdin> for Stdin {
    fn from(stdin: io::Stdin) -> Self {
        Self {
            stdin: stdin.lock(),
            pending: Vec::new(),
        }
    }
}

impl SourceRead for Stdin {
    fn read(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            let mut line = String::new();
            match self.stdin.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => self.pending = split_commands(&line),
            }
        }
        Some(self.pending.remove(0))
    }
}

/// Split a line on `;` into commands, in order.
fn split_commands(line: &str) -> Vec<String> {
    line.trim_end_matches(['\n', '\r'])
        .split(';')
        .map(str::to_string)
        .collect()
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            term: console::Term::stdout(),
            buffer: String::new(),
            pending: Vec::new(),
            history: Vec::new(),
            history_index: 0,
            visible_cursor: 0,
        }
    }

    fn is_next(&self) -> bool {
        self.history_index >= self.history.len()
    }

    /// Next or historic command, from index.
    fn current(&self) -> &str {
        self.history
            .get(self.history_index)
            .unwrap_or(&self.buffer)
    }

    /// Run before modifying `buffer`.
    /// If focused on a historic item, clone it to `buffer` and update index.
    fn update_next(&mut self) {
        if let Some(item) = self.history.get(self.history_index) {
            self.buffer = item.clone();
            self.history_index = self.history.len();
        }
    }

    fn print_prompt(&mut self) -> io::Result<()> {
        self.term.clear_line()?;
        write!(self.term, "\x1b[1;34mCommand: \x1b[0m")?;
        let current = self.current().to_string();
        write!(self.term, "{}", current)?;
        self.term
            .move_cursor_left(current.len().saturating_sub(self.visible_cursor))?;
        self.term.flush()
    }

    /// Returns `true` once the line is complete.
    fn read_key(&mut self) -> io::Result<bool> {
        match self.term.read_key()? {
            Key::Enter | Key::Char('\n') => {
                if self.is_next() && self.buffer.trim().is_empty() {
                    self.buffer.clear();
                    self.term.write_line("")?;
                } else {
                    self.update_next();
                    return Ok(true);
                }
            }

            // Ignore ASCII control characters
            Key::Char('\x00'..='\x1f' | '\x7f') => (),
            Key::Char(ch) => {
                self.update_next();
                if self.visible_cursor <= self.buffer.len() && ch.is_ascii() {
                    self.buffer.insert(self.visible_cursor, ch);
                    self.visible_cursor += 1;
                }
            }

            Key::Backspace => {
                self.update_next();
                if self.visible_cursor > 0 && self.visible_cursor <= self.buffer.len() {
                    self.buffer.remove(self.visible_cursor - 1);
                    self.visible_cursor -= 1;
                }
            }
            Key::Del => {
                self.update_next();
                if self.visible_cursor < self.buffer.len() {
                    self.buffer.remove(self.visible_cursor);
                }
            }

            Key::ArrowLeft => self.visible_cursor = self.visible_cursor.saturating_sub(1),
            Key::ArrowRight => {
                if self.visible_cursor < self.current().len() {
                    self.visible_cursor += 1;
                }
            }

            // Back/forth through history
            Key::ArrowUp => {
                if self.history_index > 0 {
                    self.history_index -= 1;
                    self.visible_cursor = self.current().len();
                }
            }
            Key::ArrowDown => {
                if self.history_index < self.history.len() {
                    self.history_index += 1;
                    self.visible_cursor = self.current().len();
                }
            }

            _ => (),
        }
        Ok(false)
    }

    /// Read entire (multi-command) line from terminal.
    fn read_line(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.visible_cursor = 0;
        loop {
            self.print_prompt()?;
            if self.read_key()? {
                break;
            }
        }
        self.term.write_line("")?;

        // Push to history if different to last command
        if self.history.last() != Some(&self.buffer) {
            self.history.push(self.buffer.clone());
        }
        self.history_index = self.history.len();
        self.pending = split_commands(&self.buffer);
        Ok(())
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRead for Terminal {
    fn read(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            // A broken terminal ends the session like EOF
            self.read_line().ok()?;
        }
        Some(self.pending.remove(0))
    }
}
