use std::fmt;

use crate::error::Fault;
use crate::memory::{Memory, MEMORY_MAX};
use crate::register::{Reg, RegisterFile};
use crate::runtime::Status;
use crate::term::Io;

/// Built-in service routines selected by the low byte of a TRAP instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapVector {
    /// Read one character without echo into R0
    Getc = 0x20,
    /// Write the character in R0
    Out = 0x21,
    /// Write the string at R0, one character per word
    Puts = 0x22,
    /// Prompt, then read one character with echo into R0
    In = 0x23,
    /// Write the string at R0, one character per word, then a newline
    Putln = 0x24,
    /// Stop the machine
    Halt = 0x25,
}

impl TryFrom<u8> for TrapVector {
    type Error = u8;

    fn try_from(vector: u8) -> Result<Self, Self::Error> {
        Ok(match vector {
            0x20 => Self::Getc,
            0x21 => Self::Out,
            0x22 => Self::Puts,
            0x23 => Self::In,
            0x24 => Self::Putln,
            0x25 => Self::Halt,
            _ => return Err(vector),
        })
    }
}

impl fmt::Display for TrapVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Getc => "GETC",
            Self::Out => "OUT",
            Self::Puts => "PUTS",
            Self::In => "IN",
            Self::Putln => "PUTLN",
            Self::Halt => "HALT",
        };
        f.write_str(name)
    }
}

const IN_PROMPT: &[u8] = b"Enter a character: ";

impl TrapVector {
    /// Run the routine.
    ///
    /// Routines do not touch COND or PC; only [`TrapVector::Halt`] changes the
    /// machine status.
    pub fn execute(
        self,
        reg: &mut RegisterFile,
        mem: &Memory,
        io: &mut impl Io,
    ) -> Result<Status, Fault> {
        match self {
            Self::Getc => {
                let ch = io.read_byte()?;
                reg.set(Reg::R0, ch as u16);
            }
            Self::Out => {
                let ch = (reg.get(Reg::R0) & 0xFF) as u8;
                io.write_bytes(&[ch])?;
                io.flush()?;
            }
            Self::Puts => {
                let string = string_at(mem, reg.get(Reg::R0));
                io.write_bytes(&string)?;
                io.flush()?;
            }
            Self::In => {
                io.write_bytes(IN_PROMPT)?;
                io.flush()?;
                let ch = io.read_byte()?;
                io.write_bytes(&[ch])?;
                io.flush()?;
                reg.set(Reg::R0, ch as u16);
            }
            Self::Putln => {
                let mut string = string_at(mem, reg.get(Reg::R0));
                string.push(b'\n');
                io.write_bytes(&string)?;
                io.flush()?;
            }
            Self::Halt => {
                io.write_bytes(b"HALT\n")?;
                io.flush()?;
                return Ok(Status::Halted);
            }
        }
        Ok(Status::Running)
    }
}

/// Collect the zero-terminated string starting at `addr`, one character per
/// word in the low byte.
///
/// Reading stops after one pass over memory if no terminator is found.
fn string_at(mem: &Memory, addr: u16) -> Vec<u8> {
    let mut string = Vec::new();
    let mut addr = addr;
    for _ in 0..MEMORY_MAX {
        let word = mem.read(addr);
        if word == 0 {
            break;
        }
        string.push((word & 0xFF) as u8);
        addr = addr.wrapping_add(1);
    }
    string
}
