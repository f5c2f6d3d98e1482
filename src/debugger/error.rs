use std::{error::Error, fmt};

use super::command::CommandName;

/// Error parsing a command.
#[derive(Debug, PartialEq)]
pub enum CommandError {
    InvalidCommand {
        command_name: String,
    },
    InvalidArgument {
        command_name: CommandName,
        error: ArgumentError,
    },
}

/// Error parsing command arguments.
#[derive(Debug, PartialEq)]
pub enum ArgumentError {
    /// For `eval`.
    MissingArgumentList { argument_name: &'static str },
    MissingArgument {
        argument_name: &'static str,
        expected_count: u8,
        actual_count: u8,
    },
    TooManyArguments {
        expected_count: u8,
        actual_count: u8,
    },
    InvalidValue {
        argument_name: &'static str,
        error: ValueError,
    },
}

/// Error parsing an argument value.
#[derive(Debug, PartialEq)]
pub enum ValueError {
    MalformedInteger { value: String },
    IntegerTooLarge { max: u32 },
    UnknownRegister { name: String },
    /// Counts must be at least 1
    NotPositive,
}

impl Error for CommandError {}
impl Error for ArgumentError {}
impl Error for ValueError {}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCommand { command_name } => {
                write!(f, "Not a command: `{}`", command_name)
            }
            Self::InvalidArgument {
                command_name,
                error,
            } => {
                write!(f, "In command `{}`: {}", command_name, error)
            }
        }
    }
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgumentList { argument_name } => {
                write!(f, "Missing argument list `{}`", argument_name)
            }
            Self::MissingArgument {
                argument_name,
                expected_count,
                actual_count,
            } => {
                write!(
                    f,
                    "Missing argument `{}` (expected {}, found {})",
                    argument_name, expected_count, actual_count
                )
            }
            Self::TooManyArguments {
                expected_count,
                actual_count,
            } => {
                write!(
                    f,
                    "Too many arguments (expected {}, found {})",
                    expected_count, actual_count
                )
            }
            Self::InvalidValue {
                argument_name,
                error,
            } => {
                write!(f, "For argument `{}`: {}", argument_name, error)
            }
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedInteger { value } => write!(f, "Malformed integer `{}`", value),
            Self::IntegerTooLarge { max } => {
                write!(f, "Integer too large (maximum ${:X})", max)
            }
            Self::UnknownRegister { name } => write!(f, "Not a register: `{}`", name),
            Self::NotPositive => write!(f, "Must be greater than zero"),
        }
    }
}
