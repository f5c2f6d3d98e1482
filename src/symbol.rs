use std::{fmt, ops::Range, str::FromStr};

use miette::SourceSpan;

/// Location within source
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Span {
    offs: SrcOffset,
    len: usize,
}

impl Span {
    pub fn new(offs: SrcOffset, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn dummy() -> Self {
        Span {
            offs: SrcOffset(0),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn offs(&self) -> usize {
        self.offs.0
    }

    pub fn end(&self) -> usize {
        self.offs.0 + self.len
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

impl From<Span> for Range<usize> {
    fn from(value: Span) -> Self {
        value.offs()..value.end()
    }
}

/// Used to refer to offsets from the start of a source file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct SrcOffset(pub usize);

/// Represents the CPU registers that can be named by `TFR`/`EXG` and the instruction suffixes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    /// Accumulator pair `A:B`.
    D,
    X,
    Y,
    U,
    /// Hardware stack pointer.
    S,
    PC,
    A,
    B,
    /// Condition code register, packed from the flags.
    CC,
    /// Direct page register.
    DP,
}

impl Register {
    /// Nibble used in the `TFR`/`EXG` post-byte.
    pub fn code(self) -> u8 {
        match self {
            Register::D => 0x0,
            Register::X => 0x1,
            Register::Y => 0x2,
            Register::U => 0x3,
            Register::S => 0x4,
            Register::PC => 0x5,
            Register::A => 0x8,
            Register::B => 0x9,
            Register::CC => 0xA,
            Register::DP => 0xB,
        }
    }

    pub fn is_wide(self) -> bool {
        matches!(
            self,
            Register::D | Register::X | Register::Y | Register::U | Register::S | Register::PC
        )
    }

    /// Number of hex digits used when the register is displayed.
    pub fn digits(self) -> usize {
        if self.is_wide() {
            4
        } else {
            2
        }
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "D" => Ok(Register::D),
            "X" => Ok(Register::X),
            "Y" => Ok(Register::Y),
            "U" => Ok(Register::U),
            "S" => Ok(Register::S),
            "PC" => Ok(Register::PC),
            "A" => Ok(Register::A),
            "B" => Ok(Register::B),
            "CC" => Ok(Register::CC),
            "DP" => Ok(Register::DP),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::D => "D",
            Register::X => "X",
            Register::Y => "Y",
            Register::U => "U",
            Register::S => "S",
            Register::PC => "PC",
            Register::A => "A",
            Register::B => "B",
            Register::CC => "CC",
            Register::DP => "DP",
        };
        f.write_str(name)
    }
}

/// Registers usable as the base of an indexed operand.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IndexReg {
    X,
    Y,
    U,
    S,
}

impl IndexReg {
    /// Post-byte emitted after the opcode of an indexed instruction.
    pub fn post_byte(self) -> u8 {
        match self {
            IndexReg::X => 0x84,
            IndexReg::Y => 0xA4,
            IndexReg::U => 0xC4,
            IndexReg::S => 0xE4,
        }
    }

    pub fn register(self) -> Register {
        match self {
            IndexReg::X => Register::X,
            IndexReg::Y => Register::Y,
            IndexReg::U => Register::U,
            IndexReg::S => Register::S,
        }
    }

    pub fn from_post_byte(byte: u8) -> Option<Self> {
        match byte {
            0x84 => Some(IndexReg::X),
            0xA4 => Some(IndexReg::Y),
            0xC4 => Some(IndexReg::U),
            0xE4 => Some(IndexReg::S),
            _ => None,
        }
    }
}

impl FromStr for IndexReg {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(IndexReg::X),
            "Y" => Ok(IndexReg::Y),
            "U" => Ok(IndexReg::U),
            "S" => Ok(IndexReg::S),
            _ => Err(()),
        }
    }
}

/// The two 8-bit accumulators.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Acc {
    A,
    B,
}

impl Acc {
    pub fn register(self) -> Register {
        match self {
            Acc::A => Register::A,
            Acc::B => Register::B,
        }
    }
}

/// How an instruction's operand maps to a value or an address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AddressingMode {
    /// No operand.
    Inherent,
    /// `#nn` literal.
    Immediate,
    /// `$nn`, combined with `DP`.
    Direct,
    /// `$nnnn`.
    Extended,
    /// `offset,REG`.
    Indexed,
    /// Bare label.
    Relative,
    /// `REG,REG` for `TFR`/`EXG`.
    RegisterPair,
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressingMode::Inherent => "inherent",
            AddressingMode::Immediate => "immediate",
            AddressingMode::Direct => "direct",
            AddressingMode::Extended => "extended",
            AddressingMode::Indexed => "indexed",
            AddressingMode::Relative => "relative",
            AddressingMode::RegisterPair => "register pair",
        };
        f.write_str(name)
    }
}

/// Branch conditions, tested against the flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Cond {
    Always,
    Eq,
    Ne,
    Mi,
    Pl,
    Cc,
    Cs,
    Vc,
    Vs,
}

/// Operation family of a mnemonic. Dispatch on this is exhaustive.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Load(Register),
    Store(Register),
    Add(Acc),
    Sub(Acc),
    Cmp(Acc),
    And(Acc),
    Or(Acc),
    Eor(Acc),
    Lsl(Acc),
    Lsr(Acc),
    Rol(Acc),
    Ror(Acc),
    Clr(Acc),
    Inc(Acc),
    Dec(Acc),
    Com(Acc),
    Neg(Acc),
    Tfr,
    Exg,
    Branch(Cond),
    Jump,
    /// `BSR`/`JSR`
    Call,
    Return,
    Nop,
    Interrupt,
    End,
}

macro_rules! mnemonics {
    ( $( $variant:ident => $name:literal, $op:expr; )* ) => {
        /// Every mnemonic the simulator understands.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub enum Mnemonic {
            $( $variant, )*
        }

        impl Mnemonic {
            pub const ALL: &'static [Mnemonic] = &[ $( Mnemonic::$variant, )* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( Mnemonic::$variant => $name, )*
                }
            }

            pub fn op(self) -> Op {
                match self {
                    $( Mnemonic::$variant => $op, )*
                }
            }
        }

        impl FromStr for Mnemonic {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $name => Ok(Mnemonic::$variant), )*
                    _ => Err(()),
                }
            }
        }
    };
}

mnemonics! {
    Lda => "LDA", Op::Load(Register::A);
    Ldb => "LDB", Op::Load(Register::B);
    Ldx => "LDX", Op::Load(Register::X);
    Ldy => "LDY", Op::Load(Register::Y);
    Ldu => "LDU", Op::Load(Register::U);
    Lds => "LDS", Op::Load(Register::S);
    Sta => "STA", Op::Store(Register::A);
    Stb => "STB", Op::Store(Register::B);
    Stx => "STX", Op::Store(Register::X);
    Sty => "STY", Op::Store(Register::Y);
    Stu => "STU", Op::Store(Register::U);
    Sts => "STS", Op::Store(Register::S);
    Adda => "ADDA", Op::Add(Acc::A);
    Addb => "ADDB", Op::Add(Acc::B);
    Suba => "SUBA", Op::Sub(Acc::A);
    Subb => "SUBB", Op::Sub(Acc::B);
    Cmpa => "CMPA", Op::Cmp(Acc::A);
    Cmpb => "CMPB", Op::Cmp(Acc::B);
    Anda => "ANDA", Op::And(Acc::A);
    Andb => "ANDB", Op::And(Acc::B);
    Ora => "ORA", Op::Or(Acc::A);
    Orb => "ORB", Op::Or(Acc::B);
    Eora => "EORA", Op::Eor(Acc::A);
    Eorb => "EORB", Op::Eor(Acc::B);
    Lsla => "LSLA", Op::Lsl(Acc::A);
    Lslb => "LSLB", Op::Lsl(Acc::B);
    Lsra => "LSRA", Op::Lsr(Acc::A);
    Lsrb => "LSRB", Op::Lsr(Acc::B);
    Rola => "ROLA", Op::Rol(Acc::A);
    Rolb => "ROLB", Op::Rol(Acc::B);
    Rora => "RORA", Op::Ror(Acc::A);
    Rorb => "RORB", Op::Ror(Acc::B);
    Clra => "CLRA", Op::Clr(Acc::A);
    Clrb => "CLRB", Op::Clr(Acc::B);
    Inca => "INCA", Op::Inc(Acc::A);
    Incb => "INCB", Op::Inc(Acc::B);
    Deca => "DECA", Op::Dec(Acc::A);
    Decb => "DECB", Op::Dec(Acc::B);
    Coma => "COMA", Op::Com(Acc::A);
    Comb => "COMB", Op::Com(Acc::B);
    Nega => "NEGA", Op::Neg(Acc::A);
    Negb => "NEGB", Op::Neg(Acc::B);
    Nop => "NOP", Op::Nop;
    Rts => "RTS", Op::Return;
    Swi => "SWI", Op::Interrupt;
    End => "END", Op::End;
    Bra => "BRA", Op::Branch(Cond::Always);
    Beq => "BEQ", Op::Branch(Cond::Eq);
    Bne => "BNE", Op::Branch(Cond::Ne);
    Bcc => "BCC", Op::Branch(Cond::Cc);
    Bcs => "BCS", Op::Branch(Cond::Cs);
    Bmi => "BMI", Op::Branch(Cond::Mi);
    Bpl => "BPL", Op::Branch(Cond::Pl);
    Bvc => "BVC", Op::Branch(Cond::Vc);
    Bvs => "BVS", Op::Branch(Cond::Vs);
    Bsr => "BSR", Op::Call;
    Jsr => "JSR", Op::Call;
    Jmp => "JMP", Op::Jump;
    Tfr => "TFR", Op::Tfr;
    Exg => "EXG", Op::Exg;
}

impl Mnemonic {
    /// Width in bytes of an immediate operand for this mnemonic.
    pub fn immediate_width(self) -> u16 {
        match self.op() {
            Op::Load(reg) if reg.is_wide() => 2,
            _ => 1,
        }
    }

    /// Relative operands are either a one-byte displacement or a two-byte absolute address.
    pub fn is_short_branch(self) -> bool {
        matches!(self.op(), Op::Branch(_)) || self == Mnemonic::Bsr
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mnemonic_names_round_trip() {
        for &mnemonic in Mnemonic::ALL {
            assert_eq!(mnemonic.name().parse::<Mnemonic>(), Ok(mnemonic));
        }
        assert!("LDZ".parse::<Mnemonic>().is_err());
    }

    #[test]
    fn register_codes() {
        let pair = ("A".parse::<Register>().unwrap().code() << 4)
            | "B".parse::<Register>().unwrap().code();
        assert_eq!(pair, 0x89);
        assert_eq!(Register::DP.code(), 0xB);
        assert!("Q".parse::<Register>().is_err());
    }

    #[test]
    fn operation_families() {
        assert_eq!(Mnemonic::Ldx.op(), Op::Load(Register::X));
        assert_eq!(Mnemonic::Bvs.op(), Op::Branch(Cond::Vs));
        assert_eq!(Mnemonic::Ldy.immediate_width(), 2);
        assert_eq!(Mnemonic::Adda.immediate_width(), 1);
        assert!(Mnemonic::Bsr.is_short_branch());
        assert!(!Mnemonic::Jsr.is_short_branch());
    }
}
