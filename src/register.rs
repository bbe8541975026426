use std::fmt;

/// Number of slots in the register file: R0-R7, PC and COND.
const REGISTER_COUNT: usize = 10;

/// Index into the register file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    PC,
    COND,
}

impl Reg {
    const GENERAL: [Reg; 8] = [
        Reg::R0,
        Reg::R1,
        Reg::R2,
        Reg::R3,
        Reg::R4,
        Reg::R5,
        Reg::R6,
        Reg::R7,
    ];

    /// General purpose register named by a 3-bit instruction field.
    ///
    /// Only the low 3 bits of `field` are considered.
    pub fn general(field: u16) -> Reg {
        Self::GENERAL[(field & 0b111) as usize]
    }
}

/// Condition code, stored in [`Reg::COND`].
///
/// Exactly one flag is set at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    P = 0b001,
    Z = 0b010,
    N = 0b100,
}

impl Flag {
    /// Flag describing `value` when interpreted as a two's complement integer.
    pub fn of(value: u16) -> Flag {
        if value == 0 {
            Flag::Z
        } else if value >> 15 == 1 {
            Flag::N
        } else {
            Flag::P
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = match self {
            Flag::N => 'n',
            Flag::Z => 'z',
            Flag::P => 'p',
        };
        write!(f, "{ch}")
    }
}

/// Fixed set of 16-bit registers owned by the execution engine.
#[derive(Clone, Debug)]
pub struct RegisterFile {
    slots: [u16; REGISTER_COUNT],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Zeroed registers, except COND which starts as [`Flag::Z`].
    pub fn new() -> Self {
        let mut slots = [0; REGISTER_COUNT];
        slots[Reg::COND as usize] = Flag::Z as u16;
        Self { slots }
    }

    #[inline]
    pub fn get(&self, reg: Reg) -> u16 {
        self.slots[reg as usize]
    }

    #[inline]
    pub fn set(&mut self, reg: Reg, value: u16) {
        self.slots[reg as usize] = value;
    }

    /// Set COND from the current value of `reg`.
    pub fn update_flags(&mut self, reg: Reg) {
        let flag = Flag::of(self.get(reg));
        self.set(Reg::COND, flag as u16);
    }

    /// Current condition code.
    ///
    /// COND must hold exactly one flag bit, as left by
    /// [`RegisterFile::update_flags`] or construction.
    pub fn flag(&self) -> Flag {
        let cond = self.get(Reg::COND);
        debug_assert!(
            matches!(cond, 0b001 | 0b010 | 0b100),
            "COND holds 0b{cond:03b}, not a single flag",
        );
        match cond {
            0b001 => Flag::P,
            0b100 => Flag::N,
            _ => Flag::Z,
        }
    }

    /// Read the program counter and advance it by one, wrapping at the end of memory.
    pub fn fetch_pc(&mut self) -> u16 {
        let pc = self.get(Reg::PC);
        self.set(Reg::PC, pc.wrapping_add(1));
        pc
    }
}
