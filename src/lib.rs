// Machine
mod register;
pub use register::{Flag, Reg, RegisterFile};
mod memory;
pub use memory::{Memory, MEMORY_MAX};
mod runtime;
pub use runtime::{sign_extend, Opcode, RunState, Status, Stop, KBDR, KBSR, PC_START};
mod trap;
pub use trap::TrapVector;

// Collaborators
mod image;
pub use image::Image;
pub mod term;

mod error;
pub use error::{fault_report, image_report, Fault, ImageError};

pub mod output;
