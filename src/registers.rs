use std::cmp::Ordering;
use std::fmt;

/// Program counter value before the first fetch.
pub const PC_START: u16 = 0x3000;

/// Condition code. Exactly one is held at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    N = 0b100,
    Z = 0b010,
    P = 0b001,
}

impl Flag {
    /// Condition code for a value interpreted as signed.
    pub fn from_value(val: u16) -> Self {
        match (val as i16).cmp(&0) {
            Ordering::Less => Flag::N,
            Ordering::Equal => Flag::Z,
            Ordering::Greater => Flag::P,
        }
    }

    /// Whether a 3-bit `nzp` branch mask selects this flag.
    pub fn matches(self, mask: u16) -> bool {
        self as u16 & mask != 0
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Flag::N => "N",
            Flag::Z => "Z",
            Flag::P => "P",
        };
        f.write_str(name)
    }
}

/// General purpose registers, program counter and condition code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registers {
    /// 8x 16-bit registers
    reg: [u16; 8],
    /// Program counter
    pc: u16,
    /// Condition code
    flag: Flag,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            reg: [0; 8],
            pc: PC_START,
            flag: Flag::Z,
        }
    }
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the low 3 bits of `idx` are used, so any decoded field is valid.
    #[inline]
    pub fn get(&self, idx: u16) -> u16 {
        self.reg[(idx & 0b111) as usize]
    }

    #[inline]
    pub fn set(&mut self, idx: u16, val: u16) {
        self.reg[(idx & 0b111) as usize] = val;
    }

    /// Write a register and replace the condition code from its new value.
    #[inline]
    pub fn set_with_flags(&mut self, idx: u16, val: u16) {
        self.set(idx, val);
        self.flag = Flag::from_value(val);
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }

    pub fn set_flag(&mut self, flag: Flag) {
        self.flag = flag;
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.reg.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_entry_address() {
        let regs = Registers::new();
        assert_eq!(regs.pc(), 0x3000);
        assert_eq!(regs.flag(), Flag::Z);
        assert!(regs.iter().all(|r| r == 0));
    }

    #[test]
    fn flag_follows_signed_value() {
        let mut regs = Registers::new();
        for val in 0..=u16::MAX {
            regs.set_with_flags(3, val);
            let expected = match val as i16 {
                v if v < 0 => Flag::N,
                0 => Flag::Z,
                _ => Flag::P,
            };
            assert_eq!(regs.flag(), expected, "value 0x{val:04x}");
            assert_eq!((regs.flag() as u8).count_ones(), 1);
        }
    }

    #[test]
    fn flag_is_replaced_not_combined() {
        let mut regs = Registers::new();
        regs.set_with_flags(0, 0x8000);
        regs.set_with_flags(0, 1);
        assert_eq!(regs.flag() as u8, 0b001);
    }

    #[test]
    fn index_uses_low_bits() {
        let mut regs = Registers::new();
        regs.set(0b1010, 7);
        assert_eq!(regs.get(2), 7);
    }

    #[test]
    fn branch_mask() {
        assert!(Flag::Z.matches(0b010));
        assert!(Flag::Z.matches(0b111));
        assert!(!Flag::Z.matches(0b101));
        assert!(!Flag::P.matches(0));
    }
}
