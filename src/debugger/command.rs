use std::fmt;
use std::str::SplitWhitespace;

use super::error::{ArgumentError, CommandError, ValueError};
use crate::symbol::Register;

/// Bytes shown by `memory` when no count is given.
const DEFAULT_MEMORY_COUNT: u16 = 16;

#[derive(Debug, PartialEq)]
pub enum Command<'a> {
    Help,
    Step { count: u32 },
    Run,
    Reset,
    Assemble,
    Registers,
    Memory { address: u16, count: u16 },
    Program,
    Set { register: Register, value: u16 },
    Eval { instruction: &'a str },
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandName {
    Help,
    Step,
    Run,
    Reset,
    Assemble,
    Registers,
    Memory,
    Program,
    Set,
    Eval,
    Quit,
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help => write!(f, "help"),
            Self::Step => write!(f, "step"),
            Self::Run => write!(f, "run"),
            Self::Reset => write!(f, "reset"),
            Self::Assemble => write!(f, "assemble"),
            Self::Registers => write!(f, "registers"),
            Self::Memory => write!(f, "memory"),
            Self::Program => write!(f, "program"),
            Self::Set => write!(f, "set"),
            Self::Eval => write!(f, "eval"),
            Self::Quit => write!(f, "quit"),
        }
    }
}

impl CommandName {
    fn from_name(name: &str) -> Option<Self> {
        // Case-insensitive, with short aliases
        Some(match name.to_ascii_lowercase().as_str() {
            "h" | "help" => Self::Help,
            "s" | "step" => Self::Step,
            "r" | "run" => Self::Run,
            "reset" => Self::Reset,
            "a" | "asm" | "assemble" => Self::Assemble,
            "reg" | "registers" => Self::Registers,
            "m" | "mem" | "memory" => Self::Memory,
            "p" | "prog" | "program" => Self::Program,
            "set" => Self::Set,
            "e" | "eval" => Self::Eval,
            "q" | "quit" | "exit" => Self::Quit,
            _ => return None,
        })
    }
}

impl<'a> TryFrom<&'a str> for Command<'a> {
    type Error = CommandError;

    /// Assumes line is non-empty.
    fn try_from(line: &'a str) -> Result<Self, Self::Error> {
        let line = line.trim();
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let command_name =
            CommandName::from_name(name).ok_or_else(|| CommandError::InvalidCommand {
                command_name: name.to_string(),
            })?;
        Command::parse_arguments(command_name, rest.trim()).map_err(|error| {
            CommandError::InvalidArgument {
                command_name,
                error,
            }
        })
    }
}

impl<'a> Command<'a> {
    fn parse_arguments(name: CommandName, rest: &'a str) -> Result<Self, ArgumentError> {
        let mut iter = ArgIter::new(rest);
        let mut expected_args = 0;

        let command = match name {
            // Allow trailing arguments
            CommandName::Help => return Ok(Self::Help),

            CommandName::Run => Self::Run,
            CommandName::Reset => Self::Reset,
            CommandName::Assemble => Self::Assemble,
            CommandName::Registers => Self::Registers,
            CommandName::Program => Self::Program,
            CommandName::Quit => Self::Quit,

            CommandName::Step => {
                expected_args = 1;
                let count = match iter.next_optional() {
                    Some(arg) => {
                        let count = parse_integer("count", arg, u32::MAX)?;
                        if count == 0 {
                            return Err(invalid("count", ValueError::NotPositive));
                        }
                        count
                    }
                    None => 1,
                };
                Self::Step { count }
            }
            CommandName::Memory => {
                expected_args = 2;
                let address = iter.next_required("address", expected_args)?;
                let address = parse_integer("address", address, u16::MAX as u32)? as u16;
                let count = match iter.next_optional() {
                    Some(arg) => parse_integer("count", arg, u16::MAX as u32)? as u16,
                    None => DEFAULT_MEMORY_COUNT,
                };
                Self::Memory { address, count }
            }
            CommandName::Set => {
                expected_args = 2;
                let register = iter.next_required("register", expected_args)?;
                let register = register.to_ascii_uppercase().parse().map_err(|()| {
                    invalid(
                        "register",
                        ValueError::UnknownRegister {
                            name: register.to_string(),
                        },
                    )
                })?;
                let value = iter.next_required("value", expected_args)?;
                let max = if Register::is_wide(register) {
                    u16::MAX as u32
                } else {
                    u8::MAX as u32
                };
                let value = parse_integer("value", value, max)? as u16;
                Self::Set { register, value }
            }

            CommandName::Eval => {
                if rest.is_empty() {
                    return Err(ArgumentError::MissingArgumentList {
                        argument_name: "instruction",
                    });
                }
                return Ok(Self::Eval { instruction: rest });
            }
        };

        iter.expect_end(expected_args)?;
        Ok(command)
    }
}

/// Whitespace-separated arguments, counting how many were taken.
struct ArgIter<'a> {
    args: SplitWhitespace<'a>,
    count: u8,
}

impl<'a> ArgIter<'a> {
    fn new(rest: &'a str) -> Self {
        Self {
            args: rest.split_whitespace(),
            count: 0,
        }
    }

    fn next_optional(&mut self) -> Option<&'a str> {
        let arg = self.args.next()?;
        self.count += 1;
        Some(arg)
    }

    fn next_required(
        &mut self,
        argument_name: &'static str,
        expected_count: u8,
    ) -> Result<&'a str, ArgumentError> {
        self.next_optional()
            .ok_or(ArgumentError::MissingArgument {
                argument_name,
                expected_count,
                actual_count: self.count,
            })
    }

    fn expect_end(&mut self, expected_count: u8) -> Result<(), ArgumentError> {
        let extra = self.args.by_ref().count() as u8;
        if extra == 0 {
            return Ok(());
        }
        Err(ArgumentError::TooManyArguments {
            expected_count,
            actual_count: self.count.saturating_add(extra),
        })
    }
}

fn invalid(argument_name: &'static str, error: ValueError) -> ArgumentError {
    ArgumentError::InvalidValue {
        argument_name,
        error,
    }
}

/// Accepts hex with a `$` or `0x` prefix, otherwise decimal.
fn parse_integer(argument_name: &'static str, arg: &str, max: u32) -> Result<u32, ArgumentError> {
    let malformed = || {
        invalid(
            argument_name,
            ValueError::MalformedInteger {
                value: arg.to_string(),
            },
        )
    };
    let value = if let Some(hex) = arg.strip_prefix('$').or_else(|| {
        arg.strip_prefix("0x")
            .or_else(|| arg.strip_prefix("0X"))
    }) {
        u32::from_str_radix(hex, 16).map_err(|_| malformed())?
    } else {
        arg.parse::<u32>().map_err(|_| malformed())?
    };
    if value > max {
        return Err(invalid(argument_name, ValueError::IntegerTooLarge { max }));
    }
    Ok(value)
}
