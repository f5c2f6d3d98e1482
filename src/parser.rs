use crate::air::{Air, AsmLine, LabelTable};
use crate::error::{ErrorKind, Result, SimError};
use crate::instr::{Instruction, Operand};
use crate::lexer::{self, Line};
use crate::state::PROGRAM_BASE;
use crate::symbol::Mnemonic;

/// Top of the program store, exclusive.
const PROGRAM_END: u32 = 0x10000;

/// Two-pass assembler. Assembly is all-or-nothing: the first failing line aborts it.
pub struct AsmParser {
    lines: Vec<Line>,
}

/// Line that passed validation, waiting for an address.
struct Validated<'l> {
    line: &'l Line,
    instr: Instruction,
    operand: Operand,
}

impl AsmParser {
    pub fn new(src: &str) -> Result<Self> {
        let lines = lexer::lex(src)?;
        Ok(AsmParser { lines })
    }

    /// Create AIR out of the source lines.
    pub fn parse(self) -> Result<Air> {
        let labels = self.collect_labels()?;

        let mut validated = Vec::new();
        for line in self.lines.iter().filter(|line| !line.is_blank()) {
            let span = line.instr_span();
            let instr = parse_instruction(line)?;
            let operand = instr
                .validate_syntax(&labels)
                .map_err(|err| err.at(line.index, span))?;
            validated.push(Validated {
                line,
                instr,
                operand,
            });
        }

        match validated.last() {
            Some(last) if last.instr.mnemonic == Mnemonic::End => (),
            Some(last) => {
                return Err(SimError::new(
                    ErrorKind::MissingEnd,
                    format!("program ends with {} instead of END", last.instr.mnemonic),
                )
                .at(last.line.index, last.line.instr_span()))
            }
            None => {
                return Err(SimError::new(
                    ErrorKind::MissingEnd,
                    "program has no instructions, expected END",
                ))
            }
        }

        let lines = Self::place(validated)?;
        let mut air = Air::new(PROGRAM_BASE, lines, labels, self.lines.len());
        Self::backpatch(&mut air)?;
        Ok(air)
    }

    /// Pass 1: bind every label to the index of the line declaring it.
    fn collect_labels(&self) -> Result<LabelTable> {
        let mut labels = LabelTable::default();
        for line in &self.lines {
            let Some(label) = &line.label else {
                continue;
            };
            if labels.insert(label.text.clone(), line.index).is_some() {
                return Err(SimError::new(
                    ErrorKind::DuplicateLabel,
                    format!("label `{}` is declared more than once", label.text),
                )
                .at(line.index, label.span));
            }
        }
        Ok(labels)
    }

    /// Give every instruction its address, in source order from the program base.
    fn place(validated: Vec<Validated>) -> Result<Vec<AsmLine>> {
        let mut address = PROGRAM_BASE as u32;
        let mut lines = Vec::with_capacity(validated.len());
        for Validated {
            line,
            instr,
            operand,
        } in validated
        {
            let span = line.instr_span();
            let size = instr.size().map_err(|err| err.at(line.index, span))?;
            if address + size as u32 > PROGRAM_END {
                return Err(SimError::new(
                    ErrorKind::ProgramTooLarge,
                    format!(
                        "{} does not fit, the program store ends at $FFFF",
                        instr.mnemonic
                    ),
                )
                .at(line.index, span));
            }
            let bytes = instr.encode().map_err(|err| err.at(line.index, span))?;
            lines.push(AsmLine {
                line: line.index,
                instr,
                operand,
                address: address as u16,
                size,
                bytes,
                span,
            });
            address += size as u32;
        }
        Ok(lines)
    }

    /// Append operand bytes now that every label has an address.
    fn backpatch(air: &mut Air) -> Result<()> {
        let mut operand_bytes = Vec::with_capacity(air.len());
        for asm in air.iter() {
            let bytes = asm
                .operand
                .bytes(asm.instr.mnemonic, asm.next_address(), |label| {
                    air.label_address(label).map(|addr| addr as u16)
                })
                .map_err(|err| err.at(asm.line, asm.span))?;
            operand_bytes.push(bytes);
        }
        for (asm, bytes) in air.iter_mut().zip(operand_bytes) {
            asm.bytes.extend(bytes);
        }
        Ok(())
    }
}

/// Build the instruction for a non-blank line.
pub fn parse_instruction(line: &Line) -> Result<Instruction> {
    let Some(mnemonic) = &line.mnemonic else {
        return Err(SimError::new(ErrorKind::SyntaxError, "expected an instruction")
            .at(line.index, line.span));
    };
    let operand = line.operand.as_ref().map(|op| op.text.as_str());
    Instruction::new(&mnemonic.text, operand).ok_or_else(|| {
        SimError::new(
            ErrorKind::SyntaxError,
            format!("unknown instruction `{}`", mnemonic.text),
        )
        .at(line.index, mnemonic.span)
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symbol::AddressingMode;

    fn assemble(src: &str) -> Result<Air> {
        AsmParser::new(src)?.parse()
    }

    fn kind(src: &str) -> ErrorKind {
        assemble(src).unwrap_err().kind
    }

    #[test]
    fn assembles_immediate_load() {
        let air = assemble("LDA #$10\nEND").unwrap();
        assert_eq!(air.image(), vec![0x86, 0x10, 0x3F]);
        assert_eq!(air.get(0).unwrap().address, 0xFE00);
        assert_eq!(air.get(1).unwrap().address, 0xFE02);
    }

    #[test]
    fn resolves_backward_branch() {
        let air = assemble("LOOP: INCA\n BNE LOOP\n END").unwrap();
        assert_eq!(air.image(), vec![0x4C, 0x26, 0xFD, 0x3F]);
        assert_eq!(air.label_address("LOOP"), Some(0xFE00));
    }

    #[test]
    fn resolves_forward_labels_on_blank_lines() {
        let src = "\
            BRA SKIP
            NOP
        SKIP:
            ; comment between
            LDX #$1234
            JMP DONE
        DONE: END";
        let air = assemble(src).unwrap();
        assert_eq!(air.label_address("SKIP"), Some(0xFE03));
        assert_eq!(
            air.image(),
            vec![0x20, 0x01, 0x12, 0x8E, 0x12, 0x34, 0x7E, 0xFE, 0x09, 0x3F]
        );
        assert_eq!(air.get(3).unwrap().instr.mode, AddressingMode::Relative);
    }

    #[test]
    fn encodes_every_mode() {
        let src = "\
            LDA $20
            STA $1000
            LDB 5,X
            STB ,S
            TFR A,B
            LDY #$0102
            END";
        let air = assemble(src).unwrap();
        assert_eq!(
            air.image(),
            vec![
                0x96, 0x20, 0xB7, 0x10, 0x00, 0xE6, 0x84, 0x05, 0xE7, 0xE4, 0x00, 0x1F, 0x89,
                0x10, 0x8E, 0x01, 0x02, 0x3F
            ]
        );
    }

    #[test]
    fn missing_end() {
        let err = assemble("LDA #$10\nINCA\n\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingEnd);
        assert_eq!(err.line, Some(2));
        assert_eq!(kind(""), ErrorKind::MissingEnd);
        assert_eq!(kind("END\nNOP"), ErrorKind::MissingEnd);
    }

    #[test]
    fn first_failing_line_wins() {
        let err = assemble("NOP\nBNE NOWHERE\nLDA #$GG\nEND").unwrap_err();
        assert_eq!(err.kind, ErrorKind::LabelNotFound);
        assert_eq!(err.line, Some(2));
        assert_eq!(err.to_string(), "Error on line 2: label `NOWHERE` not found for BNE");
    }

    #[test]
    fn reports_each_error_kind() {
        assert_eq!(kind("LDZ #1\nEND"), ErrorKind::SyntaxError);
        assert_eq!(kind("STA #$10\nEND"), ErrorKind::UnsupportedEncoding);
        assert_eq!(kind("TFR A,Q\nEND"), ErrorKind::UnknownRegister);
        assert_eq!(kind("LDA 1,Q\nEND"), ErrorKind::InvalidIndexedMode);
        assert_eq!(kind("A: NOP\nA: NOP\nEND"), ErrorKind::DuplicateLabel);
    }

    #[test]
    fn branch_out_of_range() {
        let mut src = String::from("START: NOP\n");
        for _ in 0..130 {
            src.push_str("NOP\n");
        }
        src.push_str("BRA START\nEND\n");
        let err = assemble(&src).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BranchOutOfRange);
        assert_eq!(err.line, Some(132));
    }

    #[test]
    fn program_too_large() {
        let src = "LDA $1000\n".repeat(200) + "END";
        let err = assemble(&src).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProgramTooLarge);
        assert_eq!(err.line, Some(171));
    }

    #[test]
    fn fills_program_store_exactly() {
        // 170 three-byte loads leave two bytes for the last instructions
        let src = "LDA $1000\n".repeat(170) + "NOP\nEND";
        let air = assemble(&src).unwrap();
        assert_eq!(air.end(), 0x10000);
    }
}
