use std::fmt;

/// Both stores can address the full 16-bit space.
const MEMORY_MAX: usize = 0x10000;

/// Byte store addressed by a 16-bit integer.
///
/// Addresses are only formatted (as four hex digits) when displayed.
#[derive(Clone)]
pub struct Memory {
    cells: Box<[u8; MEMORY_MAX]>,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            cells: Box::new([0; MEMORY_MAX]),
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.cells[addr as usize]
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        self.cells[addr as usize] = val;
    }

    /// Big-endian 16-bit read, wrapping at the top of memory.
    pub fn read_word(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.read(addr), self.read(addr.wrapping_add(1))])
    }

    /// Copy `bytes` in starting at `base`. Bytes past the top of memory are dropped.
    pub fn load(&mut self, base: u16, bytes: &[u8]) {
        let start = base as usize;
        let end = (start + bytes.len()).min(MEMORY_MAX);
        self.cells[start..end].copy_from_slice(&bytes[..end - start]);
    }

    /// Iterate over `count` cells starting at `base`.
    pub fn range(&self, base: u16, count: usize) -> impl Iterator<Item = (u16, u8)> + '_ {
        (0..count).map(move |i| {
            let addr = base.wrapping_add(i as u16);
            (addr, self.read(addr))
        })
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self.cells.iter().filter(|&&b| b != 0).count();
        f.debug_struct("Memory").field("nonzero", &used).finish()
    }
}
