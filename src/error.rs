use std::io;
use thiserror::Error;

/// Everything that can go wrong inside the interpreter.
///
/// Only `ProgramTooLarge` and `Io` are fatal; the rest are reported to the
/// caller (and the monitor) and the machine keeps running.
#[derive(Debug, Error)]
pub enum Chip8Error {
    #[error("program is {len} bytes, only {max} bytes fit above 0x200")]
    ProgramTooLarge { len: usize, max: usize },

    #[error("invalid opcode 0x{opcode:04x} at 0x{addr:04x}")]
    InvalidOpcode { opcode: u16, addr: u16 },

    #[error("stack overflow calling from 0x{pc:04x}")]
    StackOverflow { pc: u16 },

    #[error("stack underflow returning from 0x{pc:04x}")]
    StackUnderflow { pc: u16 },

    #[error("address 0x{addr:04x} is outside of memory")]
    OutOfBoundsAddress { addr: usize },

    #[error("register V{0:X} does not exist")]
    InvalidRegister(usize),

    #[error("key 0x{0:02x} is not on the keypad")]
    InvalidKey(u8),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Chip8Error {
    /// whether the interpreter should carry on after reporting this
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Chip8Error::ProgramTooLarge { .. } | Chip8Error::Io(_))
    }
}
