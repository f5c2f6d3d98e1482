// Parsing
mod lexer;
mod instr;
mod parser;
pub use parser::AsmParser;
mod air;
pub use air::{Air, AsmLine};
pub mod opcodes;

// Running
mod alu;
mod mem;
pub use mem::Memory;
mod state;
pub use state::{Flags, Registers, PROGRAM_BASE};
mod runtime;
pub use runtime::{Halt, RunState};
mod sim;
pub use sim::{Simulator, Snapshot, Status, PROGRAM_EXTENSION};

mod debugger;
pub use debugger::{Debugger, DebuggerOptions};
pub mod output;

mod symbol;
pub use symbol::{AddressingMode, Mnemonic, Register};

mod error;
pub use error::{ErrorKind, SimError};

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
