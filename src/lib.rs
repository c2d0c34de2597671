// Machine
mod decode;
pub use decode::{s_ext, Opcode};
mod memory;
pub use memory::{Memory, KBDR, KBSR, MEMORY_MAX};
mod registers;
pub use registers::{Flag, Registers, PC_START};

// Running
mod runtime;
pub use runtime::{RunState, Status};
mod trap;
pub use trap::{TrapVect, IN_PROMPT};
mod loader;
pub use loader::{load_file, load_image, Image};

// Host
pub mod console;
pub use console::Console;
pub mod output;

pub mod error;
pub use error::{Fault, LoadError};

