use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::air::LabelTable;
use crate::error::{ErrorKind, Result, SimError};
use crate::opcodes;
use crate::symbol::{AddressingMode, IndexReg, Mnemonic, Register};

lazy_static! {
    static ref REGISTER_PAIR: Regex = Regex::new(r"^([A-Z]{1,2}),([A-Z]{1,2})$").unwrap();
    static ref DECIMAL: Regex = Regex::new(r"^-?[0-9]+$").unwrap();
}

/// One decoded source line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operand: Option<String>,
    pub mode: AddressingMode,
}

/// Operand after validation, ready to be encoded or executed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Operand {
    None,
    Immediate(u16),
    Direct(u8),
    Extended(u16),
    Indexed { offset: i8, reg: IndexReg },
    Label(String),
    Pair(Register, Register),
}

/// Determine the addressing mode from the shape of the operand. Order of the checks matters:
/// indexed operands may start with `$`.
pub fn detect_mode(mnemonic: Mnemonic, operand: Option<&str>) -> AddressingMode {
    if matches!(mnemonic, Mnemonic::Tfr | Mnemonic::Exg) {
        return AddressingMode::RegisterPair;
    }
    let op = match operand {
        Some(op) if !op.trim().is_empty() => op.trim(),
        _ => return AddressingMode::Inherent,
    };
    if op.starts_with('#') {
        AddressingMode::Immediate
    } else if op.contains(',') {
        AddressingMode::Indexed
    } else if let Some(addr) = op.strip_prefix('$') {
        if addr.len() <= 2 {
            AddressingMode::Direct
        } else {
            AddressingMode::Extended
        }
    } else {
        AddressingMode::Relative
    }
}

/// Bytes following the opcode for `mnemonic` in `mode`.
pub fn operand_len(mnemonic: Mnemonic, mode: AddressingMode) -> u16 {
    match mode {
        AddressingMode::Inherent => 0,
        AddressingMode::Immediate => mnemonic.immediate_width(),
        AddressingMode::Direct => 1,
        AddressingMode::Extended => 2,
        // Post-byte and offset
        AddressingMode::Indexed => 2,
        AddressingMode::Relative if mnemonic.is_short_branch() => 1,
        AddressingMode::Relative => 2,
        AddressingMode::RegisterPair => 1,
    }
}

impl Instruction {
    /// Build from an upper-cased mnemonic and optional operand. Fails if the mnemonic is unknown.
    pub fn new(opcode: &str, operand: Option<&str>) -> Option<Self> {
        let mnemonic = opcode.parse::<Mnemonic>().ok()?;
        let operand = operand
            .map(|op| op.split_whitespace().collect::<String>())
            .filter(|op| !op.is_empty());
        let mode = detect_mode(mnemonic, operand.as_deref());
        Some(Instruction {
            mnemonic,
            operand,
            mode,
        })
    }

    /// Encoded length in bytes. Assembler and engine both size instructions through this.
    pub fn size(&self) -> Result<u16> {
        let opcode = self.opcode()?;
        Ok(opcode.len() + operand_len(self.mnemonic, self.mode))
    }

    fn opcode(&self) -> Result<opcodes::Opcode> {
        opcodes::lookup(self.mnemonic, self.mode).ok_or_else(|| {
            SimError::new(
                ErrorKind::UnsupportedEncoding,
                format!(
                    "{} does not support {} addressing",
                    self.mnemonic, self.mode
                ),
            )
        })
    }

    /// Opcode bytes, plus the register post-byte for `TFR`/`EXG`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = self.opcode()?.bytes();
        if self.mode == AddressingMode::RegisterPair {
            let (src, dest) = self.register_pair()?;
            bytes.push((src.code() << 4) | dest.code());
        }
        Ok(bytes)
    }

    /// Check the instruction against the opcode table and the labels declared in the program.
    /// The first rule violated is reported.
    pub fn validate_syntax(&self, labels: &LabelTable) -> Result<Operand> {
        self.opcode()?;
        let operand = match (&self.operand, self.mode) {
            (_, AddressingMode::Inherent) => return Ok(Operand::None),
            (Some(operand), _) => operand.as_str(),
            (None, _) => {
                return Err(syntax(format!("missing operand for {}", self.mnemonic)));
            }
        };

        match self.mode {
            AddressingMode::Inherent => Ok(Operand::None),
            AddressingMode::Immediate => {
                let Some(payload) = operand.strip_prefix('#') else {
                    return Err(syntax("immediate operand must start with `#`"));
                };
                let payload = payload.strip_prefix('$').unwrap_or(payload);
                let value = parse_hex(payload, 4)
                    .ok_or_else(|| syntax(format!("operand is not hexadecimal: {operand}")))?;
                if self.mnemonic.immediate_width() == 1 && value > 0xFF {
                    return Err(syntax(format!(
                        "immediate value {operand} does not fit in 8 bits"
                    )));
                }
                Ok(Operand::Immediate(value))
            }
            AddressingMode::Direct => {
                let payload = operand.trim_start_matches('$');
                let value = parse_hex(payload, 2)
                    .ok_or_else(|| syntax(format!("operand is not hexadecimal: {operand}")))?;
                Ok(Operand::Direct(value as u8))
            }
            AddressingMode::Extended => {
                let payload = operand.trim_start_matches('$');
                let value = parse_hex(payload, 4)
                    .ok_or_else(|| syntax(format!("invalid extended address: {operand}")))?;
                Ok(Operand::Extended(value))
            }
            AddressingMode::Indexed => parse_indexed(operand),
            AddressingMode::Relative => {
                if labels.contains_key(operand) {
                    Ok(Operand::Label(operand.to_string()))
                } else {
                    Err(SimError::new(
                        ErrorKind::LabelNotFound,
                        format!("label `{}` not found for {}", operand, self.mnemonic),
                    ))
                }
            }
            AddressingMode::RegisterPair => {
                let (src, dest) = self.register_pair()?;
                Ok(Operand::Pair(src, dest))
            }
        }
    }

    fn register_pair(&self) -> Result<(Register, Register)> {
        let operand = self.operand.as_deref().unwrap_or_default();
        let caps = REGISTER_PAIR.captures(operand).ok_or_else(|| {
            syntax(format!(
                "{} expects two registers separated by a comma",
                self.mnemonic
            ))
        })?;
        let reg = |name: &str| {
            name.parse::<Register>().map_err(|_| {
                SimError::new(
                    ErrorKind::UnknownRegister,
                    format!("unknown register `{name}`"),
                )
            })
        };
        Ok((reg(&caps[1])?, reg(&caps[2])?))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {}", self.mnemonic, operand),
            None => write!(f, "{}", self.mnemonic),
        }
    }
}

impl Operand {
    /// Bytes following the opcode (and `TFR`/`EXG` post-byte, already part of [`Instruction::encode`]).
    ///
    /// `next` is the address directly after the instruction; `target` resolves labels to addresses.
    pub fn bytes(
        &self,
        mnemonic: Mnemonic,
        next: u16,
        target: impl Fn(&str) -> Option<u16>,
    ) -> Result<Vec<u8>> {
        let bytes = match self {
            Operand::None | Operand::Pair(..) => Vec::new(),
            Operand::Immediate(value) if mnemonic.immediate_width() == 2 => {
                value.to_be_bytes().to_vec()
            }
            Operand::Immediate(value) => vec![*value as u8],
            Operand::Direct(addr) => vec![*addr],
            Operand::Extended(addr) => addr.to_be_bytes().to_vec(),
            Operand::Indexed { offset, reg } => vec![reg.post_byte(), *offset as u8],
            Operand::Label(label) => {
                let addr = target(label).ok_or_else(|| {
                    SimError::new(ErrorKind::LabelNotFound, format!("label `{label}` not found"))
                })?;
                if mnemonic.is_short_branch() {
                    vec![displacement(next, addr)? as u8]
                } else {
                    addr.to_be_bytes().to_vec()
                }
            }
        };
        Ok(bytes)
    }
}

/// Signed 8-bit displacement from `next` to `target`.
pub fn displacement(next: u16, target: u16) -> Result<i8> {
    let offset = target as i32 - next as i32;
    i8::try_from(offset).map_err(|_| {
        SimError::new(
            ErrorKind::BranchOutOfRange,
            format!("branch target ${target:04X} is {offset} bytes away"),
        )
    })
}

fn syntax(message: impl Into<String>) -> SimError {
    SimError::new(ErrorKind::SyntaxError, message)
}

/// Parse up to `max_digits` hexadecimal digits.
fn parse_hex(s: &str, max_digits: usize) -> Option<u16> {
    if s.is_empty() || s.len() > max_digits || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(s, 16).ok()
}

fn parse_indexed(operand: &str) -> Result<Operand> {
    let Some((offset, reg)) = operand.split_once(',') else {
        return Err(syntax("indexed operand must contain a comma"));
    };
    let reg = reg.parse::<IndexReg>().map_err(|_| {
        SimError::new(
            ErrorKind::InvalidIndexedMode,
            format!("indexed mode not supported: `{operand}`"),
        )
    })?;
    let offset = if offset.is_empty() {
        0
    } else if let Some(hex) = offset.strip_prefix('$') {
        parse_hex(hex, 2).ok_or_else(|| syntax(format!("invalid offset `{offset}`")))? as u8 as i8
    } else if DECIMAL.is_match(offset) {
        match offset.parse::<i16>() {
            Ok(value @ -128..=255) => value as u8 as i8,
            _ => return Err(syntax(format!("offset `{offset}` does not fit in 8 bits"))),
        }
    } else {
        return Err(syntax(format!("invalid offset `{offset}`")));
    };
    Ok(Operand::Indexed { offset, reg })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::air::LabelTable;

    fn instr(line: &str) -> Instruction {
        let mut parts = line.splitn(2, ' ');
        let opcode = parts.next().unwrap();
        Instruction::new(opcode, parts.next()).unwrap()
    }

    fn labels(names: &[&str]) -> LabelTable {
        let mut table = LabelTable::default();
        for (i, name) in names.iter().enumerate() {
            table.insert(name.to_string(), i);
        }
        table
    }

    #[test]
    fn detects_modes_in_order() {
        use AddressingMode::*;
        let cases = [
            ("NOP", Inherent),
            ("LDA #$10", Immediate),
            ("LDA $10,X", Indexed),
            ("LDA ,Y", Indexed),
            ("LDA $10", Direct),
            ("LDA $1", Direct),
            ("LDA $1000", Extended),
            ("BNE LOOP", Relative),
            ("TFR A,B", RegisterPair),
            ("EXG", RegisterPair),
        ];
        for (line, mode) in cases {
            assert_eq!(instr(line).mode, mode, "{line}");
        }
    }

    #[test]
    fn operand_whitespace_is_ignored() {
        let instr = instr("LDA $10, X");
        assert_eq!(instr.operand.as_deref(), Some("$10,X"));
        assert_eq!(instr.mode, AddressingMode::Indexed);
    }

    #[test]
    fn unknown_mnemonic() {
        assert!(Instruction::new("LDZ", Some("#1")).is_none());
    }

    #[test]
    fn encodes_register_pair_post_byte() {
        assert_eq!(instr("TFR A,B").encode(), Ok(vec![0x1F, 0x89]));
        assert_eq!(instr("EXG X,DP").encode(), Ok(vec![0x1E, 0x1B]));
        let err = instr("TFR A,Q").encode().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownRegister);
    }

    #[test]
    fn encode_rejects_unsupported_mode() {
        let err = instr("STA #$10").encode().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedEncoding);
    }

    #[test]
    fn sizes() {
        assert_eq!(instr("LDA #$10").size(), Ok(2));
        assert_eq!(instr("LDX #$1000").size(), Ok(3));
        assert_eq!(instr("LDY #$1000").size(), Ok(4));
        assert_eq!(instr("STA $1000").size(), Ok(3));
        assert_eq!(instr("STA $10").size(), Ok(2));
        assert_eq!(instr("STA ,X").size(), Ok(3));
        assert_eq!(instr("BNE LOOP").size(), Ok(2));
        assert_eq!(instr("JMP LOOP").size(), Ok(3));
        assert_eq!(instr("TFR A,B").size(), Ok(2));
        assert_eq!(instr("INCA").size(), Ok(1));
    }

    #[test]
    fn validation_rules() {
        let table = labels(&["LOOP"]);
        let kind = |line: &str| instr(line).validate_syntax(&table).map_err(|e| e.kind);

        assert_eq!(kind("LDA #$10"), Ok(Operand::Immediate(0x10)));
        assert_eq!(kind("LDA #10"), Ok(Operand::Immediate(0x10)));
        assert_eq!(kind("LDX #$ABCD"), Ok(Operand::Immediate(0xABCD)));
        assert_eq!(kind("LDA #$100"), Err(ErrorKind::SyntaxError));
        assert_eq!(kind("LDA #$G1"), Err(ErrorKind::SyntaxError));
        assert_eq!(kind("STA #$10"), Err(ErrorKind::UnsupportedEncoding));
        assert_eq!(kind("INCA $10"), Err(ErrorKind::UnsupportedEncoding));
        assert_eq!(kind("LDA $12345"), Err(ErrorKind::SyntaxError));
        assert_eq!(kind("BNE LOOP"), Ok(Operand::Label("LOOP".into())));
        assert_eq!(kind("BNE NOWHERE"), Err(ErrorKind::LabelNotFound));
        assert_eq!(kind("TFR A,B"), Ok(Operand::Pair(Register::A, Register::B)));
        assert_eq!(kind("TFR A"), Err(ErrorKind::SyntaxError));
        assert_eq!(kind("TFR"), Err(ErrorKind::SyntaxError));
        assert_eq!(kind("EXG A,Q"), Err(ErrorKind::UnknownRegister));
        assert_eq!(kind("LDA $10,Q"), Err(ErrorKind::InvalidIndexedMode));
        assert_eq!(kind("LDA $10,PC"), Err(ErrorKind::InvalidIndexedMode));
        assert_eq!(kind("LDA 300,X"), Err(ErrorKind::SyntaxError));
    }

    #[test]
    fn indexed_offsets() {
        let table = LabelTable::default();
        let operand = |line: &str| instr(line).validate_syntax(&table).unwrap();
        assert_eq!(
            operand("LDA ,X"),
            Operand::Indexed { offset: 0, reg: IndexReg::X }
        );
        assert_eq!(
            operand("LDA -2,U"),
            Operand::Indexed { offset: -2, reg: IndexReg::U }
        );
        assert_eq!(
            operand("LDA $FF,S"),
            Operand::Indexed { offset: -1, reg: IndexReg::S }
        );
        assert_eq!(
            operand("LDA 16,Y"),
            Operand::Indexed { offset: 16, reg: IndexReg::Y }
        );
    }

    #[test]
    fn operand_bytes() {
        let target = |label: &str| (label == "LOOP").then_some(0xFE00);
        let bytes = |op: Operand, m: Mnemonic, next: u16| op.bytes(m, next, target);

        assert_eq!(bytes(Operand::Immediate(0x10), Mnemonic::Lda, 0), Ok(vec![0x10]));
        assert_eq!(
            bytes(Operand::Immediate(0x10), Mnemonic::Ldx, 0),
            Ok(vec![0x00, 0x10])
        );
        assert_eq!(
            bytes(Operand::Extended(0x1234), Mnemonic::Sta, 0),
            Ok(vec![0x12, 0x34])
        );
        assert_eq!(
            bytes(Operand::Indexed { offset: -1, reg: IndexReg::Y }, Mnemonic::Lda, 0),
            Ok(vec![0xA4, 0xFF])
        );
        // BNE at FE01 jumping back to FE00
        assert_eq!(
            bytes(Operand::Label("LOOP".into()), Mnemonic::Bne, 0xFE03),
            Ok(vec![0xFD])
        );
        assert_eq!(
            bytes(Operand::Label("LOOP".into()), Mnemonic::Jmp, 0xFE10),
            Ok(vec![0xFE, 0x00])
        );
        let err = bytes(Operand::Label("LOOP".into()), Mnemonic::Bra, 0xFF00).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BranchOutOfRange);
    }
}
