use std::{error::Error, fmt};

use miette::{miette, LabeledSpan, Report, Severity};

use crate::symbol::Span;

pub type Result<T> = std::result::Result<T, SimError>;

/// Classification of everything that can go wrong while assembling or executing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing mnemonic or operand shape.
    SyntaxError,
    /// No opcode table entry for the mnemonic and addressing mode.
    UnsupportedEncoding,
    UnknownRegister,
    LabelNotFound,
    /// Last instruction of the program is not `END`.
    MissingEnd,
    /// Unknown mnemonic reached at execution time.
    UnsupportedInstruction,
    /// Index register outside of X, Y, U, S.
    InvalidIndexedMode,
    DuplicateLabel,
    BranchOutOfRange,
    /// Encoded program does not fit below the top of memory.
    ProgramTooLarge,
    /// Control transferred to an address that starts no instruction.
    InvalidAddress,
    /// `run` executed more instructions than allowed.
    StepLimit,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::SyntaxError => "asm::syntax",
            Self::UnsupportedEncoding => "asm::encoding",
            Self::UnknownRegister => "asm::register",
            Self::LabelNotFound => "asm::label_not_found",
            Self::MissingEnd => "asm::missing_end",
            Self::UnsupportedInstruction => "run::unsupported",
            Self::InvalidIndexedMode => "asm::indexed",
            Self::DuplicateLabel => "asm::duplicate_label",
            Self::BranchOutOfRange => "asm::branch_range",
            Self::ProgramTooLarge => "asm::too_large",
            Self::InvalidAddress => "run::address",
            Self::StepLimit => "run::step_limit",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Self::SyntaxError => "lines take the form `[LABEL:] MNEMONIC [OPERAND]`",
            Self::UnsupportedEncoding => "this instruction does not support that addressing mode",
            Self::UnknownRegister => "valid registers are D, X, Y, U, S, PC, A, B, CC and DP",
            Self::LabelNotFound => "declare the label as `NAME:` at the start of a line",
            Self::MissingEnd => "finish the program with an `END` instruction",
            Self::UnsupportedInstruction => "check the list of supported instructions",
            Self::InvalidIndexedMode => "indexed operands use X, Y, U or S, e.g. `$10,X`",
            Self::DuplicateLabel => "labels may only be declared once per program",
            Self::BranchOutOfRange => "branch targets must be within -128..127 bytes",
            Self::ProgramTooLarge => "programs must fit between $FE00 and $FFFF",
            Self::InvalidAddress => "jumps and returns must land on the start of an instruction",
            Self::StepLimit => "the program may loop forever; raise SIM6809_MAX_STEPS if not",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::SyntaxError => "invalid syntax",
            Self::UnsupportedEncoding => "unsupported mode",
            Self::UnknownRegister => "unknown register",
            Self::LabelNotFound => "undeclared label",
            Self::MissingEnd => "last instruction",
            Self::UnsupportedInstruction => "unknown instruction",
            Self::InvalidIndexedMode => "invalid index register",
            Self::DuplicateLabel => "duplicate label",
            Self::BranchOutOfRange => "target too far",
            Self::ProgramTooLarge => "does not fit",
            Self::InvalidAddress => "bad target",
            Self::StepLimit => "still running here",
        }
    }
}

/// Error raised by the assembler or the execution engine.
#[derive(Clone, Debug, PartialEq)]
pub struct SimError {
    pub kind: ErrorKind,
    /// 1-based source line, when the error belongs to one.
    pub line: Option<usize>,
    pub span: Option<Span>,
    pub message: String,
}

impl SimError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        SimError {
            kind,
            line: None,
            span: None,
            message: message.into(),
        }
    }

    /// Attach a zero-based line index and its span. Keeps the first location given.
    pub fn at(mut self, line_idx: usize, span: Span) -> Self {
        if self.line.is_none() {
            self.line = Some(line_idx + 1);
            self.span = Some(span);
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Convert into a diagnostic pointing into `src`.
    pub fn report(&self, src: &str) -> Report {
        let labels = match self.span {
            Some(span) => vec![LabeledSpan::at(span, self.kind.label())],
            None => Vec::new(),
        };
        miette!(
            severity = Severity::Error,
            code = self.kind.code(),
            help = self.kind.help(),
            labels = labels,
            "{}",
            self
        )
        .with_source_code(src.to_string())
    }
}

impl Error for SimError {}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Error on line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symbol::SrcOffset;

    #[test]
    fn keeps_first_location() {
        let err = SimError::new(ErrorKind::MissingEnd, "no END")
            .at(2, Span::new(SrcOffset(10), 3))
            .at(7, Span::dummy());
        assert_eq!(err.line, Some(3));
        assert_eq!(err.to_string(), "Error on line 3: no END");
    }

    #[test]
    fn report_carries_code() {
        let err = SimError::new(ErrorKind::LabelNotFound, "label `LOOP` not declared")
            .at(0, Span::new(SrcOffset(4), 4));
        let report = err.report("BRA LOOP\nEND\n");
        let code = report.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("asm::label_not_found"));
    }
}
