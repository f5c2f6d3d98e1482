use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use lazy_static::lazy_static;

use crate::mem::Memory;
use crate::symbol::{AddressingMode, IndexReg, Mnemonic};

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Opcode prefix selecting the second opcode page.
const PAGE2: u8 = 0x10;

/// Opcode value, one byte or two when prefixed with a page byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Opcode(u16);

impl Opcode {
    pub fn bytes(self) -> Vec<u8> {
        let [page, code] = self.0.to_be_bytes();
        if page == 0 {
            vec![code]
        } else {
            vec![page, code]
        }
    }

    pub fn len(self) -> u16 {
        if self.0 > 0xFF {
            2
        } else {
            1
        }
    }
}

use crate::symbol::AddressingMode::{Direct as Dir, Extended as Ext, Immediate as Imm, Indexed as Idx};
use crate::symbol::AddressingMode::{Inherent as Inh, Relative as Rel, RegisterPair as Pair};
use crate::symbol::Mnemonic::*;

#[rustfmt::skip]
const ENTRIES: &[(Mnemonic, &[(AddressingMode, u16)])] = &[
    // Loads
    (Lda, &[(Imm, 0x86), (Dir, 0x96), (Ext, 0xB6), (Idx, 0xA6)]),
    (Ldb, &[(Imm, 0xC6), (Dir, 0xD6), (Ext, 0xF6), (Idx, 0xE6)]),
    (Ldx, &[(Imm, 0x8E), (Dir, 0x9E), (Ext, 0xBE), (Idx, 0xAE)]),
    (Ldy, &[(Imm, 0x108E), (Dir, 0x109E), (Ext, 0x10BE), (Idx, 0x10AE)]),
    (Ldu, &[(Imm, 0xCE), (Dir, 0xDE), (Ext, 0xFE), (Idx, 0xEE)]),
    (Lds, &[(Imm, 0x10CE), (Dir, 0x10DE), (Ext, 0x10FE), (Idx, 0x10EE)]),
    // Stores
    (Sta, &[(Dir, 0x97), (Ext, 0xB7), (Idx, 0xA7)]),
    (Stb, &[(Dir, 0xD7), (Ext, 0xF7), (Idx, 0xE7)]),
    (Stx, &[(Dir, 0x9F), (Ext, 0xBF), (Idx, 0xAF)]),
    (Sty, &[(Dir, 0x109F), (Ext, 0x10BF), (Idx, 0x10AF)]),
    (Stu, &[(Dir, 0xDF), (Ext, 0xFF), (Idx, 0xEF)]),
    (Sts, &[(Dir, 0x10DF), (Ext, 0x10FF), (Idx, 0x10EF)]),
    // Arithmetic
    (Adda, &[(Imm, 0x8B), (Dir, 0x9B), (Ext, 0xBB), (Idx, 0xAB)]),
    (Addb, &[(Imm, 0xCB), (Dir, 0xDB), (Ext, 0xFB), (Idx, 0xEB)]),
    (Suba, &[(Imm, 0x80), (Dir, 0x90), (Ext, 0xB0), (Idx, 0xA0)]),
    (Subb, &[(Imm, 0xC0), (Dir, 0xD0), (Ext, 0xF0), (Idx, 0xE0)]),
    (Cmpa, &[(Imm, 0x81), (Dir, 0x91), (Ext, 0xB1), (Idx, 0xA1)]),
    (Cmpb, &[(Imm, 0xC1), (Dir, 0xD1), (Ext, 0xF1), (Idx, 0xE1)]),
    // Logic
    (Anda, &[(Imm, 0x84), (Dir, 0x94), (Ext, 0xB4), (Idx, 0xA4)]),
    (Andb, &[(Imm, 0xC4), (Dir, 0xD4), (Ext, 0xF4), (Idx, 0xE4)]),
    (Ora, &[(Imm, 0x8A), (Dir, 0x9A), (Ext, 0xBA), (Idx, 0xAA)]),
    (Orb, &[(Imm, 0xCA), (Dir, 0xDA), (Ext, 0xFA), (Idx, 0xEA)]),
    (Eora, &[(Imm, 0x88), (Dir, 0x98), (Ext, 0xB8), (Idx, 0xA8)]),
    (Eorb, &[(Imm, 0xC8), (Dir, 0xD8), (Ext, 0xF8), (Idx, 0xE8)]),
    // Shifts and rotates
    (Lsla, &[(Inh, 0x48)]),
    (Lslb, &[(Inh, 0x58)]),
    (Lsra, &[(Inh, 0x44)]),
    (Lsrb, &[(Inh, 0x54)]),
    (Rola, &[(Inh, 0x49)]),
    (Rolb, &[(Inh, 0x59)]),
    (Rora, &[(Inh, 0x46)]),
    (Rorb, &[(Inh, 0x56)]),
    // Accumulator unary
    (Clra, &[(Inh, 0x4F)]),
    (Clrb, &[(Inh, 0x5F)]),
    (Inca, &[(Inh, 0x4C)]),
    (Incb, &[(Inh, 0x5C)]),
    (Deca, &[(Inh, 0x4A)]),
    (Decb, &[(Inh, 0x5A)]),
    (Coma, &[(Inh, 0x43)]),
    (Comb, &[(Inh, 0x53)]),
    (Nega, &[(Inh, 0x40)]),
    (Negb, &[(Inh, 0x50)]),
    // System
    (Nop, &[(Inh, 0x12)]),
    (Rts, &[(Inh, 0x39)]),
    (Swi, &[(Inh, 0x3F)]),
    // Shares SWI's encoding, so must come after it
    (End, &[(Inh, 0x3F)]),
    // Branches
    (Bra, &[(Rel, 0x20)]),
    (Bcc, &[(Rel, 0x24)]),
    (Bcs, &[(Rel, 0x25)]),
    (Bne, &[(Rel, 0x26)]),
    (Beq, &[(Rel, 0x27)]),
    (Bvc, &[(Rel, 0x28)]),
    (Bvs, &[(Rel, 0x29)]),
    (Bpl, &[(Rel, 0x2A)]),
    (Bmi, &[(Rel, 0x2B)]),
    (Bsr, &[(Rel, 0x8D)]),
    // Jumps. Label forms assemble to the extended encoding
    (Jmp, &[(Ext, 0x7E), (Idx, 0x6E), (Rel, 0x7E)]),
    (Jsr, &[(Dir, 0x9D), (Ext, 0xBD), (Idx, 0xAD), (Rel, 0xBD)]),
    // Register moves
    (Tfr, &[(Pair, 0x1F)]),
    (Exg, &[(Pair, 0x1E)]),
];

lazy_static! {
    static ref OPCODE_TABLE: FxMap<Mnemonic, FxMap<AddressingMode, Opcode>> = {
        let mut table = FxMap::default();
        for (mnemonic, modes) in ENTRIES {
            let modes: FxMap<_, _> = modes.iter().map(|&(mode, code)| (mode, Opcode(code))).collect();
            table.insert(*mnemonic, modes);
        }
        table
    };

    /// Reverse table. The first entry for an encoding is the canonical one.
    static ref DECODE_TABLE: FxMap<u16, (Mnemonic, AddressingMode)> = {
        let mut table = FxMap::default();
        for (mnemonic, modes) in ENTRIES {
            for &(mode, code) in modes.iter() {
                table.entry(code).or_insert((*mnemonic, mode));
            }
        }
        table
    };
}

/// Look up the encoding of `mnemonic` in `mode`.
pub fn lookup(mnemonic: Mnemonic, mode: AddressingMode) -> Option<Opcode> {
    OPCODE_TABLE.get(&mnemonic)?.get(&mode).copied()
}

/// Addressing modes `mnemonic` can be encoded with.
pub fn modes(mnemonic: Mnemonic) -> impl Iterator<Item = AddressingMode> {
    OPCODE_TABLE
        .get(&mnemonic)
        .into_iter()
        .flat_map(|modes| modes.keys().copied())
}

/// A single instruction read back out of the program store.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Decoded {
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,
    /// Total encoded length including operand bytes.
    pub len: u16,
}

/// Decode the instruction starting at `addr`. Returns `None` for bytes outside the table.
pub fn decode(mem: &Memory, addr: u16) -> Option<Decoded> {
    let first = mem.read(addr);
    let code = if first == PAGE2 {
        u16::from_be_bytes([first, mem.read(addr.wrapping_add(1))])
    } else {
        first as u16
    };
    let &(mnemonic, mode) = DECODE_TABLE.get(&code)?;
    let opcode = Opcode(code);
    if mode == AddressingMode::Indexed {
        let post = mem.read(addr.wrapping_add(opcode.len()));
        IndexReg::from_post_byte(post)?;
    }
    let operand_len = crate::instr::operand_len(mnemonic, mode);
    Some(Decoded {
        mnemonic,
        mode,
        len: opcode.len() + operand_len,
    })
}
