use log::debug;

use crate::console::Console;
use crate::decode;
use crate::error::Fault;
use crate::runtime::{RunState, Status};

/// Prompt written by `IN` before reading.
pub const IN_PROMPT: &str = "Enter a character: ";

/// Stored in R0 when host input is exhausted.
const EOF: u16 = 0xFFFF;

/// Service selected by the low 8 bits of a `TRAP` instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapVect {
    Getc = 0x20,
    Out = 0x21,
    Puts = 0x22,
    In = 0x23,
    Putsp = 0x24,
    Halt = 0x25,
}

impl TryFrom<u8> for TrapVect {
    type Error = u8;
    fn try_from(vector: u8) -> Result<Self, Self::Error> {
        Ok(match vector {
            0x20 => Self::Getc,
            0x21 => Self::Out,
            0x22 => Self::Puts,
            0x23 => Self::In,
            0x24 => Self::Putsp,
            0x25 => Self::Halt,
            _ => return Err(vector),
        })
    }
}

impl<C: Console> RunState<C> {
    pub(crate) fn trap(&mut self, instr: u16, addr: u16) -> Result<(), Fault> {
        let vector = TrapVect::try_from(decode::trap_vect(instr))
            .map_err(|vector| Fault::UnknownTrap { vector, addr })?;

        match vector {
            TrapVect::Getc => {
                let ch = self.console.read_byte().map_or(EOF, u16::from);
                self.reg.set(0, ch);
            }
            TrapVect::Out => {
                self.console.write_byte(self.reg.get(0) as u8);
            }
            TrapVect::Puts => {
                for word in self.string_words() {
                    self.console.write_byte(word as u8);
                }
                self.console.flush();
            }
            TrapVect::In => {
                for byte in IN_PROMPT.bytes() {
                    self.console.write_byte(byte);
                }
                self.console.flush();
                let ch = self.console.read_byte();
                if let Some(ch) = ch {
                    self.console.write_byte(ch);
                    self.console.flush();
                }
                self.reg.set(0, ch.map_or(EOF, u16::from));
            }
            TrapVect::Putsp => {
                for word in self.string_words() {
                    let [low, high] = word.to_le_bytes();
                    self.console.write_byte(low);
                    if high != 0 {
                        self.console.write_byte(high);
                    }
                }
                self.console.flush();
            }
            TrapVect::Halt => {
                self.console.flush();
                debug!("halted at 0x{addr:04x}");
                self.status = Status::Halted;
            }
        }
        Ok(())
    }

    /// Words of the zero-terminated string at R0. Stops after one pass over memory.
    fn string_words(&self) -> Vec<u16> {
        let start = self.reg.get(0);
        (0..=u16::MAX)
            .map(|i| self.mem.get(start.wrapping_add(i)))
            .take_while(|word| *word != 0)
            .collect()
    }
}
