use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::instr::{Instruction, Operand};
use crate::mem::Memory;
use crate::symbol::Span;

/// Label name to the zero-based index of the line declaring it.
pub type LabelTable = IndexMap<String, usize, FxBuildHasher>;

/// Assembly intermediate representation: every instruction with its address and encoding.
#[derive(Clone, Debug)]
pub struct Air {
    /// Address of the first instruction
    orig: u16,
    lines: Vec<AsmLine>,
    labels: LabelTable,
    /// Amount of source lines, blank ones included
    line_count: usize,
}

/// One assembled, non-blank source line.
#[derive(Clone, Debug)]
pub struct AsmLine {
    /// Zero-based source line index
    pub line: usize,
    pub instr: Instruction,
    pub operand: Operand,
    pub address: u16,
    /// Encoded length, known before the operand bytes are
    pub size: u16,
    pub bytes: Vec<u8>,
    pub span: Span,
}

impl AsmLine {
    /// Address directly after this instruction. Wraps past the top of memory.
    pub fn next_address(&self) -> u16 {
        self.address.wrapping_add(self.size)
    }
}

impl Air {
    pub fn new(orig: u16, lines: Vec<AsmLine>, labels: LabelTable, line_count: usize) -> Self {
        Air {
            orig,
            lines,
            labels,
            line_count,
        }
    }

    pub fn orig(&self) -> u16 {
        self.orig
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn get(&self, idx: usize) -> Option<&AsmLine> {
        self.lines.get(idx)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AsmLine> {
        self.lines.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, AsmLine> {
        self.lines.iter_mut()
    }

    /// First address past the program. Wider than `u16` since a program may end exactly at the
    /// top of memory.
    pub fn end(&self) -> u32 {
        self.lines
            .last()
            .map_or(self.orig as u32, |line| line.address as u32 + line.size as u32)
    }

    /// Index of the instruction starting at `address`.
    pub fn index_of(&self, address: u16) -> Option<usize> {
        self.lines
            .binary_search_by_key(&address, |line| line.address)
            .ok()
    }

    /// Index of the first instruction on or after source line `line`.
    pub fn index_from_line(&self, line: usize) -> usize {
        self.lines.partition_point(|asm| asm.line < line)
    }

    /// Address a label resolves to: that of the first instruction at or below its line.
    pub fn label_address(&self, label: &str) -> Option<u32> {
        let &line = self.labels.get(label)?;
        let idx = self.index_from_line(line);
        Some(match self.lines.get(idx) {
            Some(asm) => asm.address as u32,
            None => self.end(),
        })
    }

    /// Every byte of the program, in address order.
    pub fn image(&self) -> Vec<u8> {
        self.lines
            .iter()
            .flat_map(|line| line.bytes.iter().copied())
            .collect()
    }

    /// Write the program into `mem` at its origin.
    pub fn emit(&self, mem: &mut Memory) {
        mem.load(self.orig, &self.image());
    }
}

impl<'a> IntoIterator for &'a Air {
    type Item = &'a AsmLine;
    type IntoIter = std::slice::Iter<'a, AsmLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}
