use std::{error, fmt, io, path::PathBuf};

use miette::{miette, Report, Severity};

/// Condition that stops the execution engine before a halt trap.
#[derive(Debug)]
pub enum Fault {
    /// Opcode 0b1101, reserved by the architecture.
    ReservedOpcode { addr: u16, instr: u16 },
    /// RTI, which requires supervisor mode.
    PrivilegedOpcode { addr: u16, instr: u16 },
    /// Opcode which could not be decoded.
    IllegalOpcode { addr: u16, instr: u16 },
    /// TRAP with a vector outside of the trap table.
    UnknownTrap { addr: u16, vector: u8 },
    /// Console collaborator failed during a trap or keyboard poll.
    Io(io::Error),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::ReservedOpcode { addr, instr } => {
                write!(f, "reserved opcode 0x{instr:04x} at 0x{addr:04x}")
            }
            Fault::PrivilegedOpcode { addr, instr } => {
                write!(f, "privileged instruction 0x{instr:04x} at 0x{addr:04x}")
            }
            Fault::IllegalOpcode { addr, instr } => {
                write!(f, "illegal instruction 0x{instr:04x} at 0x{addr:04x}")
            }
            Fault::UnknownTrap { addr, vector } => {
                write!(f, "unknown trap vector 0x{vector:02x} at 0x{addr:04x}")
            }
            Fault::Io(e) => write!(f, "console error: {e}"),
        }
    }
}

impl error::Error for Fault {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Fault::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Fault {
    fn from(e: io::Error) -> Self {
        Fault::Io(e)
    }
}

/// Reason an object image could not be loaded.
#[derive(Debug)]
pub enum ImageError {
    Open { path: PathBuf, source: io::Error },
    Empty,
    Unaligned { len: usize },
    TooLarge { origin: u16, words: usize },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Open { path, source } => {
                write!(f, "could not read {}: {source}", path.display())
            }
            ImageError::Empty => write!(f, "image has no origin word"),
            ImageError::Unaligned { len } => {
                write!(f, "image length of {len} bytes is not aligned to 16 bits")
            }
            ImageError::TooLarge { origin, words } => {
                write!(f, "{words} words at origin 0x{origin:04x} do not fit in memory")
            }
        }
    }
}

impl error::Error for ImageError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ImageError::Open { source, .. } => Some(source),
            _ => None,
        }
    }
}

// Runtime errors

pub fn fault_report(fault: &Fault) -> Report {
    let (code, help) = match fault {
        Fault::ReservedOpcode { .. } => (
            "runtime::reserved_opcode",
            "opcode 0b1101 is reserved; the image may be corrupt or loaded at the wrong origin",
        ),
        Fault::PrivilegedOpcode { .. } => (
            "runtime::privileged_opcode",
            "RTI is only valid in supervisor mode, which this machine does not model",
        ),
        Fault::IllegalOpcode { .. } => (
            "runtime::illegal_opcode",
            "the instruction could not be decoded",
        ),
        Fault::UnknownTrap { .. } => (
            "runtime::unknown_trap",
            "supported trap vectors are x20 through x25",
        ),
        Fault::Io(_) => (
            "runtime::console",
            "console input may have ended before the program finished reading",
        ),
    };
    miette!(
        severity = Severity::Error,
        code = code,
        help = help,
        "Execution stopped: {fault}",
    )
}

// Loader errors

pub fn image_report(path: &str, e: &ImageError) -> Report {
    let (code, help) = match e {
        ImageError::Open { .. } => ("image::open", "check that the file exists and is readable"),
        ImageError::Empty => (
            "image::empty",
            "an image starts with a big-endian origin address",
        ),
        ImageError::Unaligned { .. } => (
            "image::unaligned",
            "images are a stream of big-endian 16-bit words",
        ),
        ImageError::TooLarge { .. } => (
            "image::too_large",
            "the image would run past address 0xFFFF",
        ),
    };
    miette!(
        severity = Severity::Error,
        code = code,
        help = help,
        "Failed to load image: {path}\n{e}",
    )
}
