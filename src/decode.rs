use std::fmt;

/// Operation selected by the top 4 bits of an instruction.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    BR,
    ADD,
    LD,
    ST,
    JSR,
    AND,
    LDR,
    STR,
    /// Return from interrupt. Not supported, always faults.
    RTI,
    NOT,
    LDI,
    STI,
    JMP,
    /// Reserved. Always faults.
    RES,
    LEA,
    TRAP,
}

impl Opcode {
    const TABLE: [Opcode; 16] = [
        Opcode::BR,   // 0x0
        Opcode::ADD,  // 0x1
        Opcode::LD,   // 0x2
        Opcode::ST,   // 0x3
        Opcode::JSR,  // 0x4
        Opcode::AND,  // 0x5
        Opcode::LDR,  // 0x6
        Opcode::STR,  // 0x7
        Opcode::RTI,  // 0x8
        Opcode::NOT,  // 0x9
        Opcode::LDI,  // 0xA
        Opcode::STI,  // 0xB
        Opcode::JMP,  // 0xC
        Opcode::RES,  // 0xD
        Opcode::LEA,  // 0xE
        Opcode::TRAP, // 0xF
    ];

    #[inline]
    pub fn decode(instr: u16) -> Self {
        Self::TABLE[(instr >> 12) as usize]
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Sign-extend the low `bits` of `val` to 16 bits.
#[inline]
pub fn s_ext(val: u16, bits: u32) -> u16 {
    debug_assert!(bits > 0 && bits < 16);
    // Sign bit
    let sign = val & (1u16 << (bits - 1));
    // Bits lower than sign bit
    let magnitude = val & ((1u16 << bits) - 1);
    // Positive input: all bits unset; 0x0000
    // Negative input: sign bit and above will be set, lower bits will be reset
    //      Eg. bits=14 -> 0xE000
    let sign_extension = (!sign).wrapping_add(1); // sign * -1
    magnitude | sign_extension
}

/// Destination (or `ST*` source) register, bits 11..9.
#[inline]
pub fn dr(instr: u16) -> u16 {
    (instr >> 9) & 0b111
}

/// First source or base register, bits 8..6.
#[inline]
pub fn sr1(instr: u16) -> u16 {
    (instr >> 6) & 0b111
}

/// Second source register, bits 2..0.
#[inline]
pub fn sr2(instr: u16) -> u16 {
    instr & 0b111
}

/// `ADD`/`AND` immediate mode, bit 5.
#[inline]
pub fn is_imm(instr: u16) -> bool {
    instr & 0x0020 != 0
}

/// `JSR` long offset mode, bit 11.
#[inline]
pub fn is_long_jump(instr: u16) -> bool {
    instr & 0x0800 != 0
}

/// Branch condition mask, bits 11..9.
#[inline]
pub fn nzp(instr: u16) -> u16 {
    (instr >> 9) & 0b111
}

#[inline]
pub fn trap_vect(instr: u16) -> u8 {
    (instr & 0xFF) as u8
}
