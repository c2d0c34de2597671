use std::path::PathBuf;
use std::{error::Error, fmt, io};

use miette::{miette, Report, Severity};

use crate::decode::Opcode;

/// Unrecoverable condition which stops the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Instruction has an opcode with no defined behaviour (`RTI` or reserved).
    IllegalOpcode { opcode: Opcode, instr: u16, addr: u16 },
    /// `TRAP` with a vector no service is defined for.
    UnknownTrap { vector: u8, addr: u16 },
}

impl Fault {
    /// Address of the faulting instruction.
    pub fn addr(&self) -> u16 {
        match self {
            Self::IllegalOpcode { addr, .. } | Self::UnknownTrap { addr, .. } => *addr,
        }
    }
}

impl Error for Fault {}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalOpcode {
                opcode,
                instr,
                addr,
            } => write!(
                f,
                "illegal opcode {opcode} (instruction 0x{instr:04x}) at 0x{addr:04x}"
            ),
            Self::UnknownTrap { vector, addr } => {
                write!(f, "unknown trap vector 0x{vector:02x} at 0x{addr:04x}")
            }
        }
    }
}

/// Failure to load a program image.
#[derive(Debug)]
pub enum LoadError {
    Open { path: PathBuf, source: io::Error },
    Read(io::Error),
    /// Image is shorter than its origin word.
    MissingOrigin,
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::Read(source) => Some(source),
            Self::MissingOrigin => None,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "Could not open `{}`: {source}", path.display())
            }
            Self::Read(source) => write!(f, "Could not read image: {source}"),
            Self::MissingOrigin => f.write_str("Image does not contain an origin word"),
        }
    }
}

// Diagnostics

pub fn load_failed(err: LoadError) -> Report {
    let help = match err {
        LoadError::Open { .. } => "check that the path exists and is readable",
        LoadError::Read(_) => "the image may have been truncated or modified while reading",
        LoadError::MissingOrigin => {
            "images start with a big-endian origin address, followed by program words"
        }
    };
    miette!(
        severity = Severity::Error,
        code = "load::image",
        help = help,
        "{err}",
    )
}

pub fn fault(fault: Fault) -> Report {
    let help = match fault {
        Fault::IllegalOpcode { .. } => {
            "execution may have run past the end of the program; make sure it ends with HALT"
        }
        Fault::UnknownTrap { .. } => "defined trap vectors are x20 to x25",
    };
    miette!(
        severity = Severity::Error,
        code = "run::fault",
        help = help,
        "Execution faulted: {fault}",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_messages() {
        let fault = Fault::IllegalOpcode {
            opcode: Opcode::RES,
            instr: 0xd123,
            addr: 0x3004,
        };
        assert_eq!(
            fault.to_string(),
            "illegal opcode RES (instruction 0xd123) at 0x3004"
        );
        assert_eq!(fault.addr(), 0x3004);

        let fault = Fault::UnknownTrap {
            vector: 0x7f,
            addr: 0x3000,
        };
        assert_eq!(fault.to_string(), "unknown trap vector 0x7f at 0x3000");
    }

    #[test]
    fn reports_carry_message() {
        let report = load_failed(LoadError::MissingOrigin);
        assert_eq!(report.to_string(), "Image does not contain an origin word");

        let report = super::fault(Fault::UnknownTrap {
            vector: 0x30,
            addr: 0x3001,
        });
        assert!(report.to_string().contains("unknown trap vector 0x30"));
    }
}
