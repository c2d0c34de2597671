use std::io::Read;
use std::path::Path;

use log::{debug, trace};

use crate::console::Console;
use crate::decode::{self, s_ext, Opcode};
use crate::error::{Fault, LoadError};
use crate::loader::{self, Image};
use crate::memory::Memory;
use crate::registers::Registers;

/// Lifecycle of the engine. `Halted` and `Faulted` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ready,
    Running,
    Halted,
    Faulted(Fault),
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Halted | Status::Faulted(_))
    }
}

/// Represents complete program state during runtime.
pub struct RunState<C: Console> {
    /// System memory, including device registers.
    pub(crate) mem: Memory,
    pub(crate) reg: Registers,
    pub(crate) console: C,
    pub(crate) status: Status,
}

impl<C: Console> RunState<C> {
    pub fn new(console: C) -> Self {
        Self::from_memory(Memory::new(), console)
    }

    /// State with preloaded memory.
    pub fn from_memory(mem: Memory, console: C) -> Self {
        Self {
            mem,
            reg: Registers::new(),
            console,
            status: Status::Ready,
        }
    }

    pub fn load_image<R: Read>(&mut self, reader: R) -> Result<Image, LoadError> {
        loader::load_image(&mut self.mem, reader)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Image, LoadError> {
        loader::load_file(&mut self.mem, path)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn registers(&self) -> &Registers {
        &self.reg
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.reg
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn into_console(self) -> C {
        self.console
    }

    /// Run until `HALT` or a fault.
    pub fn run(&mut self) -> Result<(), Fault> {
        loop {
            match self.step() {
                Status::Halted => return Ok(()),
                Status::Faulted(fault) => return Err(fault),
                Status::Ready | Status::Running => (),
            }
        }
    }

    /// Execute a single instruction. Does nothing once halted or faulted.
    pub fn step(&mut self) -> Status {
        if self.status.is_terminal() {
            return self.status;
        }
        self.status = Status::Running;

        let addr = self.reg.pc();
        let instr = self.mem_read(addr);
        // PC incremented before instruction is performed
        self.reg.set_pc(addr.wrapping_add(1));
        let opcode = Opcode::decode(instr);
        trace!("0x{addr:04x}: 0x{instr:04x} {opcode}");

        if let Err(fault) = self.execute(opcode, instr, addr) {
            debug!("{fault}");
            self.console.flush();
            self.status = Status::Faulted(fault);
        }
        self.status
    }

    fn execute(&mut self, opcode: Opcode, instr: u16, addr: u16) -> Result<(), Fault> {
        match opcode {
            Opcode::BR => self.br(instr),
            Opcode::ADD => self.add(instr),
            Opcode::LD => self.ld(instr),
            Opcode::ST => self.st(instr),
            Opcode::JSR => self.jsr(instr),
            Opcode::AND => self.and(instr),
            Opcode::LDR => self.ldr(instr),
            Opcode::STR => self.str(instr),
            Opcode::NOT => self.not(instr),
            Opcode::LDI => self.ldi(instr),
            Opcode::STI => self.sti(instr),
            Opcode::JMP => self.jmp(instr),
            Opcode::LEA => self.lea(instr),
            Opcode::TRAP => return self.trap(instr, addr),
            Opcode::RTI | Opcode::RES => {
                return Err(Fault::IllegalOpcode {
                    opcode,
                    instr,
                    addr,
                })
            }
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn mem_read(&mut self, addr: u16) -> u16 {
        self.mem.read(addr, &mut self.console)
    }

    /// PC-relative address with a 9-bit offset.
    #[inline]
    fn pc_offset9(&self, instr: u16) -> u16 {
        self.reg.pc().wrapping_add(s_ext(instr, 9))
    }

    /// Base register address with a 6-bit offset.
    #[inline]
    fn base_offset6(&self, instr: u16) -> u16 {
        self.reg
            .get(decode::sr1(instr))
            .wrapping_add(s_ext(instr, 6))
    }

    /// Second operand of `ADD` and `AND`.
    #[inline]
    fn operand2(&self, instr: u16) -> u16 {
        if decode::is_imm(instr) {
            s_ext(instr, 5)
        } else {
            self.reg.get(decode::sr2(instr))
        }
    }

    fn add(&mut self, instr: u16) {
        let val1 = self.reg.get(decode::sr1(instr));
        let res = val1.wrapping_add(self.operand2(instr));
        self.reg.set_with_flags(decode::dr(instr), res);
    }

    fn and(&mut self, instr: u16) {
        let val1 = self.reg.get(decode::sr1(instr));
        let res = val1 & self.operand2(instr);
        self.reg.set_with_flags(decode::dr(instr), res);
    }

    fn not(&mut self, instr: u16) {
        let val = !self.reg.get(decode::sr1(instr));
        self.reg.set_with_flags(decode::dr(instr), val);
    }

    fn br(&mut self, instr: u16) {
        if self.reg.flag().matches(decode::nzp(instr)) {
            self.reg.set_pc(self.pc_offset9(instr));
        }
    }

    /// Also `RET`, as `JMP R7`.
    fn jmp(&mut self, instr: u16) {
        self.reg.set_pc(self.reg.get(decode::sr1(instr)));
    }

    fn jsr(&mut self, instr: u16) {
        // Read base first, in case of `JSRR R7`
        let target = if decode::is_long_jump(instr) {
            self.reg.pc().wrapping_add(s_ext(instr, 11))
        } else {
            self.reg.get(decode::sr1(instr))
        };
        self.reg.set(7, self.reg.pc());
        self.reg.set_pc(target);
    }

    fn ld(&mut self, instr: u16) {
        let val = self.mem_read(self.pc_offset9(instr));
        self.reg.set_with_flags(decode::dr(instr), val);
    }

    fn ldi(&mut self, instr: u16) {
        let ptr = self.mem_read(self.pc_offset9(instr));
        let val = self.mem_read(ptr);
        self.reg.set_with_flags(decode::dr(instr), val);
    }

    fn ldr(&mut self, instr: u16) {
        let val = self.mem_read(self.base_offset6(instr));
        self.reg.set_with_flags(decode::dr(instr), val);
    }

    fn lea(&mut self, instr: u16) {
        let val = self.pc_offset9(instr);
        self.reg.set_with_flags(decode::dr(instr), val);
    }

    fn st(&mut self, instr: u16) {
        let val = self.reg.get(decode::dr(instr));
        self.mem.write(self.pc_offset9(instr), val);
    }

    fn sti(&mut self, instr: u16) {
        let val = self.reg.get(decode::dr(instr));
        let ptr = self.mem_read(self.pc_offset9(instr));
        self.mem.write(ptr, val);
    }

    fn str(&mut self, instr: u16) {
        let val = self.reg.get(decode::dr(instr));
        self.mem.write(self.base_offset6(instr), val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Buffered;
    use crate::registers::Flag;

    /// State with `program` placed at the entry address.
    fn with_program(program: &[u16]) -> RunState<Buffered> {
        let mut state = RunState::new(Buffered::new());
        state.mem.copy_from(0x3000, program);
        state
    }

    #[test]
    fn starts_ready_at_entry() {
        let state = with_program(&[]);
        assert_eq!(state.status(), Status::Ready);
        assert_eq!(state.registers().pc(), 0x3000);
    }

    #[test]
    fn add_immediate() {
        // ADD R0, R1, #-3
        let mut state = with_program(&[0b0001_000_001_1_11101]);
        state.reg.set(1, 5);
        assert_eq!(state.step(), Status::Running);
        assert_eq!(state.reg.get(0), 2);
        assert_eq!(state.reg.flag(), Flag::P);
        assert_eq!(state.reg.pc(), 0x3001);
    }

    #[test]
    fn add_registers_wraps() {
        // ADD R2, R3, R4
        let mut state = with_program(&[0b0001_010_011_0_00_100]);
        state.reg.set(3, 0x7fff);
        state.reg.set(4, 1);
        state.step();
        assert_eq!(state.reg.get(2), 0x8000);
        assert_eq!(state.reg.flag(), Flag::N);

        let mut state = with_program(&[0b0001_010_011_0_00_100]);
        state.reg.set(3, 0xffff);
        state.reg.set(4, 1);
        state.step();
        assert_eq!(state.reg.get(2), 0);
        assert_eq!(state.reg.flag(), Flag::Z);
    }

    #[test]
    fn and() {
        // AND R0, R0, #0 ; AND R1, R2, R3
        let mut state = with_program(&[0b0101_000_000_1_00000, 0b0101_001_010_0_00_011]);
        state.reg.set(0, 0x1234);
        state.reg.set(2, 0xff0f);
        state.reg.set(3, 0x8f0f);
        state.step();
        assert_eq!(state.reg.get(0), 0);
        assert_eq!(state.reg.flag(), Flag::Z);
        state.step();
        assert_eq!(state.reg.get(1), 0x8f0f);
        assert_eq!(state.reg.flag(), Flag::N);
    }

    #[test]
    fn not() {
        // NOT R5, R6
        let mut state = with_program(&[0b1001_101_110_111111]);
        state.reg.set(6, 0xff00);
        state.step();
        assert_eq!(state.reg.get(5), 0x00ff);
        assert_eq!(state.reg.flag(), Flag::P);
    }

    #[test]
    fn branch_taken_when_mask_matches() {
        // BRz #4
        let mut state = with_program(&[0b0000_010_000000100]);
        state.reg.set_flag(Flag::Z);
        state.step();
        assert_eq!(state.reg.pc(), 0x3005);
    }

    #[test]
    fn branch_not_taken() {
        // BRnp #4
        let mut state = with_program(&[0b0000_101_000000100]);
        state.reg.set_flag(Flag::Z);
        state.step();
        assert_eq!(state.reg.pc(), 0x3001);
    }

    #[test]
    fn branch_backwards() {
        // BRnzp #-1 (loops on itself)
        let mut state = with_program(&[0b0000_111_111111111]);
        state.step();
        assert_eq!(state.reg.pc(), 0x3000);
        // Flags untouched
        assert_eq!(state.reg.flag(), Flag::Z);
    }

    #[test]
    fn jmp_and_ret() {
        // JMP R3 ; RET
        let mut state = with_program(&[0b1100_000_011_000000]);
        state.reg.set(3, 0x4000);
        state.mem.write(0x4000, 0b1100_000_111_000000);
        state.reg.set(7, 0x3001);
        state.step();
        assert_eq!(state.reg.pc(), 0x4000);
        state.step();
        assert_eq!(state.reg.pc(), 0x3001);
    }

    #[test]
    fn jsr_offset() {
        // JSR #-2
        let mut state = with_program(&[0b0100_1_11111111110]);
        state.step();
        assert_eq!(state.reg.get(7), 0x3001);
        assert_eq!(state.reg.pc(), 0x2fff);
    }

    #[test]
    fn jsrr_register() {
        // JSRR R2 ; JSRR R7
        let mut state = with_program(&[0b0100_0_00_010_000000, 0b0100_0_00_111_000000]);
        state.reg.set(2, 0x3001);
        state.step();
        assert_eq!(state.reg.get(7), 0x3001);
        assert_eq!(state.reg.pc(), 0x3001);
        state.step();
        // Jumps to old R7
        assert_eq!(state.reg.pc(), 0x3001);
        assert_eq!(state.reg.get(7), 0x3002);
    }

    #[test]
    fn loads() {
        let mut state = with_program(&[
            0b0010_001_000000010, // LD R1, #2
            0b1010_010_000000010, // LDI R2, #2
            0b0110_011_100_111111, // LDR R3, R4, #-1
            0x8000,               // data
            0x5000,               // pointer
        ]);
        state.mem.write(0x5000, 0x0042);
        state.mem.write(0x6000, 0x0000);
        state.reg.set(4, 0x6001);

        state.step();
        assert_eq!(state.reg.get(1), 0x8000);
        assert_eq!(state.reg.flag(), Flag::N);
        state.step();
        assert_eq!(state.reg.get(2), 0x0042);
        assert_eq!(state.reg.flag(), Flag::P);
        state.step();
        assert_eq!(state.reg.get(3), 0);
        assert_eq!(state.reg.flag(), Flag::Z);
    }

    #[test]
    fn lea_sets_address_and_flags() {
        // LEA R0, #-0x100
        let mut state = with_program(&[0b1110_000_100000000]);
        state.step();
        assert_eq!(state.reg.get(0), 0x2f01);
        assert_eq!(state.reg.flag(), Flag::P);
        // No memory load
        assert_eq!(state.mem.get(0x2f01), 0);
    }

    #[test]
    fn stores() {
        let mut state = with_program(&[
            0b0011_001_000000010, // ST R1, #2
            0b1011_010_000000010, // STI R2, #2
            0b0111_011_100_000011, // STR R3, R4, #3
            0x0000,               // ST target
            0x5000,               // pointer
        ]);
        state.reg.set(1, 0x1111);
        state.reg.set(2, 0x2222);
        state.reg.set(3, 0x3333);
        state.reg.set(4, 0x6000);
        state.reg.set_flag(Flag::N);

        for _ in 0..3 {
            state.step();
        }
        assert_eq!(state.mem.get(0x3003), 0x1111);
        assert_eq!(state.mem.get(0x5000), 0x2222);
        assert_eq!(state.mem.get(0x6003), 0x3333);
        // Stores do not set flags
        assert_eq!(state.reg.flag(), Flag::N);
    }

    #[test]
    fn ldi_through_keyboard_status() {
        // LDI R0, #0 ; .FILL xFE00
        let mut state = with_program(&[0b1010_000_000000000, 0xfe00]);
        state.console.push_input("x");
        state.step();
        assert_eq!(state.reg.get(0), 0x8000);
        assert_eq!(state.mem.get(0xfe02), b'x' as u16);
    }

    #[test]
    fn reserved_opcodes_fault() {
        for instr in [0xd000, 0x8000] {
            let mut state = with_program(&[instr]);
            state.reg.set(1, 9);
            let before = state.reg.clone();

            let status = state.step();
            let Status::Faulted(fault) = status else {
                panic!("expected fault, got {status:?}");
            };
            assert_eq!(fault.addr(), 0x3000);
            assert!(matches!(fault, Fault::IllegalOpcode { instr: i, .. } if i == instr));

            // Only PC pre-increment
            let mut expected = before;
            expected.set_pc(0x3001);
            assert_eq!(state.reg, expected);
            assert_eq!(state.console.flushes(), 1);

            // Terminal
            assert_eq!(state.step(), status);
            assert_eq!(state.reg.pc(), 0x3001);
        }
    }

    #[test]
    fn run_until_fault() {
        // ADD R1, R1, #1 ; reserved
        let mut state = with_program(&[0x1261, 0xd000]);
        let fault = state.run().unwrap_err();
        assert_eq!(
            fault,
            Fault::IllegalOpcode {
                opcode: Opcode::RES,
                instr: 0xd000,
                addr: 0x3001
            }
        );
        assert_eq!(state.reg.get(1), 1);
    }

    #[test]
    fn pc_wraps_at_end_of_memory() {
        let mut state = with_program(&[]);
        state.reg.set_pc(0xffff);
        // ADD R0, R0, #1
        state.mem.write(0xffff, 0x1021);
        state.step();
        assert_eq!(state.reg.pc(), 0x0000);
        assert_eq!(state.reg.get(0), 1);
    }

    #[test]
    fn instances_are_independent() {
        let mut a = with_program(&[0x1261]);
        let b = with_program(&[0x1261]);
        a.step();
        assert_eq!(a.reg.get(1), 1);
        assert_eq!(b.reg.get(1), 0);
        assert_eq!(b.status(), Status::Ready);
    }
}
