use std::ops::{Index, Range};

use crate::console::Console;

/// LC3 can address 128KB of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Keyboard status register. Bit 15 is set while a key is ready.
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register. Holds the last key read through `KBSR`.
pub const KBDR: u16 = 0xFE02;

const KEY_READY: u16 = 1 << 15;

/// System memory, with keyboard device registers mapped in.
pub struct Memory {
    cells: Box<[u16; MEMORY_MAX]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            cells: Box::new([0; MEMORY_MAX]),
        }
    }

    /// Read a word as the program sees it.
    ///
    /// Reading `KBSR` polls the console first, updating both device registers.
    pub fn read<C: Console + ?Sized>(&mut self, addr: u16, console: &mut C) -> u16 {
        if addr == KBSR {
            match console.poll_key() {
                Some(key) => {
                    self.cells[KBSR as usize] = KEY_READY;
                    self.cells[KBDR as usize] = key as u16;
                }
                None => self.cells[KBSR as usize] = 0,
            }
        }
        self.cells[addr as usize]
    }

    pub fn write(&mut self, addr: u16, val: u16) {
        self.cells[addr as usize] = val;
    }

    /// Read a word without device side effects.
    pub fn get(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    /// Copy `words` in from `origin`, stopping at the end of memory.
    ///
    /// Returns amount of words copied.
    pub fn copy_from(&mut self, origin: u16, words: &[u16]) -> usize {
        let start = origin as usize;
        let len = words.len().min(MEMORY_MAX - start);
        self.cells[start..start + len].copy_from_slice(&words[..len]);
        len
    }
}

impl Index<Range<u16>> for Memory {
    type Output = [u16];
    fn index(&self, range: Range<u16>) -> &[u16] {
        &self.cells[range.start as usize..range.end as usize]
    }
}
