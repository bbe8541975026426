use std::{fmt, io};

use crate::error::Fault;
use crate::image::Image;
use crate::memory::Memory;
use crate::register::{Reg, RegisterFile};
use crate::term::Io;
use crate::trace;
use crate::trap::TrapVector;

/// Address of the first instruction executed.
pub const PC_START: u16 = 0x3000;
/// Keyboard status register. Bit 15 is set when a key is waiting in [`KBDR`].
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register.
pub const KBDR: u16 = 0xFE02;

/// Instructions between checks for an operator interrupt.
const INTERRUPT_INTERVAL: u64 = 0x1000;

/// Machine status after an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted,
}

/// Reason [`RunState::run`] returned without a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stop {
    /// The program executed the halt trap
    Halted,
    /// The operator interrupted the program
    Interrupted,
}

/// Operation selected by the top 4 bits of an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    Br = 0x0,
    Add = 0x1,
    Ld = 0x2,
    St = 0x3,
    Jsr = 0x4,
    And = 0x5,
    Ldr = 0x6,
    Str = 0x7,
    Rti = 0x8,
    Not = 0x9,
    Ldi = 0xA,
    Sti = 0xB,
    Jmp = 0xC,
    Res = 0xD,
    Lea = 0xE,
    Trap = 0xF,
}

impl TryFrom<u16> for Opcode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            0x0 => Self::Br,
            0x1 => Self::Add,
            0x2 => Self::Ld,
            0x3 => Self::St,
            0x4 => Self::Jsr,
            0x5 => Self::And,
            0x6 => Self::Ldr,
            0x7 => Self::Str,
            0x8 => Self::Rti,
            0x9 => Self::Not,
            0xA => Self::Ldi,
            0xB => Self::Sti,
            0xC => Self::Jmp,
            0xD => Self::Res,
            0xE => Self::Lea,
            0xF => Self::Trap,
            _ => return Err(value),
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Br => "BR",
            Self::Add => "ADD",
            Self::Ld => "LD",
            Self::St => "ST",
            Self::Jsr => "JSR",
            Self::And => "AND",
            Self::Ldr => "LDR",
            Self::Str => "STR",
            Self::Rti => "RTI",
            Self::Not => "NOT",
            Self::Ldi => "LDI",
            Self::Sti => "STI",
            Self::Jmp => "JMP",
            Self::Res => "RES",
            Self::Lea => "LEA",
            Self::Trap => "TRAP",
        };
        f.write_str(name)
    }
}

/// Widen the low `bit_count` bits of `x` to 16 bits, copying bit `bit_count - 1` upwards.
///
/// Bits above the field are expected to be clear already; they are kept as-is
/// when the field is positive.
#[inline]
pub fn sign_extend(x: u16, bit_count: u32) -> u16 {
    debug_assert!(bit_count > 0 && bit_count < 16);
    if (x >> (bit_count - 1)) & 1 == 1 {
        x | (0xFFFF << bit_count)
    } else {
        x
    }
}

// Instruction fields

#[inline]
fn dr(instr: u16) -> Reg {
    Reg::general(instr >> 9)
}

#[inline]
fn sr1(instr: u16) -> Reg {
    Reg::general(instr >> 6)
}

#[inline]
fn pc_offset9(instr: u16) -> u16 {
    sign_extend(instr & 0x1FF, 9)
}

/// Represents complete machine state during runtime.
pub struct RunState {
    reg: RegisterFile,
    mem: Memory,
    status: Status,
    /// Instructions executed so far
    cycles: u64,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// Empty memory, with PC at [`PC_START`].
    pub fn new() -> Self {
        Self::with_memory(Memory::new())
    }

    /// Start running from already populated memory.
    pub fn with_memory(mem: Memory) -> Self {
        let mut reg = RegisterFile::new();
        reg.set(Reg::PC, PC_START);
        Self {
            reg,
            mem,
            status: Status::Running,
            cycles: 0,
        }
    }

    pub fn load(&mut self, image: &Image) {
        self.mem.load(image);
    }

    pub fn reg(&self) -> &RegisterFile {
        &self.reg
    }

    pub fn reg_mut(&mut self) -> &mut RegisterFile {
        &mut self.reg
    }

    pub fn mem(&self) -> &Memory {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    pub fn pc(&self) -> u16 {
        self.reg.get(Reg::PC)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run until the program halts, faults, or is interrupted.
    pub fn run(&mut self, io: &mut impl Io) -> Result<Stop, Fault> {
        while self.is_running() {
            if self.cycles % INTERRUPT_INTERVAL == 0 {
                if let Err(e) = io.check_interrupt() {
                    self.status = Status::Halted;
                    return stop_or_fault(Fault::Io(e));
                }
            }
            if let Err(fault) = self.step(io) {
                return stop_or_fault(fault);
            }
        }
        Ok(Stop::Halted)
    }

    /// Fetch, decode and execute a single instruction.
    ///
    /// Any fault halts the machine. Stepping a halted machine does nothing.
    pub fn step(&mut self, io: &mut impl Io) -> Result<Status, Fault> {
        if !self.is_running() {
            return Ok(Status::Halted);
        }

        let addr = self.reg.fetch_pc();
        let instr = self.mem.read(addr);
        let result = self.execute(addr, instr, io);
        self.cycles += 1;

        self.status = match result {
            Ok(status) => status,
            Err(_) => Status::Halted,
        };
        trace!(
            "x{addr:04X}  {instr:04X}  {:<5} cc={:03b}",
            Opcode::try_from(instr >> 12).map_or_else(|_| "???".to_string(), |op| op.to_string()),
            self.reg.get(Reg::COND),
        );
        result
    }

    fn execute(&mut self, addr: u16, instr: u16, io: &mut impl Io) -> Result<Status, Fault> {
        let opcode =
            Opcode::try_from(instr >> 12).map_err(|_| Fault::IllegalOpcode { addr, instr })?;

        match opcode {
            Opcode::Br => self.br(instr),
            Opcode::Add => self.add(instr),
            Opcode::Ld => self.ld(instr, io)?,
            Opcode::St => self.st(instr),
            Opcode::Jsr => self.jsr(instr),
            Opcode::And => self.and(instr),
            Opcode::Ldr => self.ldr(instr, io)?,
            Opcode::Str => self.str(instr),
            Opcode::Not => self.not(instr),
            Opcode::Ldi => self.ldi(instr, io)?,
            Opcode::Sti => self.sti(instr, io)?,
            Opcode::Jmp => self.jmp(instr),
            Opcode::Lea => self.lea(instr),
            Opcode::Trap => return self.trap(addr, instr, io),
            Opcode::Rti => return Err(Fault::PrivilegedOpcode { addr, instr }),
            Opcode::Res => return Err(Fault::ReservedOpcode { addr, instr }),
        }
        Ok(Status::Running)
    }

    /// Memory read as seen by a program, with the keyboard registers mapped in.
    fn read(&mut self, addr: u16, io: &mut impl Io) -> Result<u16, Fault> {
        if addr == KBSR {
            match io.poll_byte()? {
                Some(key) => {
                    self.mem.write(KBSR, 1 << 15);
                    self.mem.write(KBDR, key as u16);
                }
                None => self.mem.write(KBSR, 0),
            }
        }
        Ok(self.mem.read(addr))
    }

    /// Write `value` to `reg` and set flags from it.
    fn define(&mut self, reg: Reg, value: u16) {
        self.reg.set(reg, value);
        self.reg.update_flags(reg);
    }

    /// Second operand of ADD and AND: a register, or a 5-bit immediate.
    fn operand2(&self, instr: u16) -> u16 {
        if instr & 0b10_0000 == 0 {
            self.reg.get(Reg::general(instr))
        } else {
            sign_extend(instr & 0x1F, 5)
        }
    }

    fn add(&mut self, instr: u16) {
        let val = self.reg.get(sr1(instr)).wrapping_add(self.operand2(instr));
        self.define(dr(instr), val);
    }

    fn and(&mut self, instr: u16) {
        let val = self.reg.get(sr1(instr)) & self.operand2(instr);
        self.define(dr(instr), val);
    }

    fn not(&mut self, instr: u16) {
        let val = !self.reg.get(sr1(instr));
        self.define(dr(instr), val);
    }

    fn br(&mut self, instr: u16) {
        let nzp = (instr >> 9) & 0b111;
        if nzp & self.reg.get(Reg::COND) != 0 {
            let pc = self.pc().wrapping_add(pc_offset9(instr));
            self.reg.set(Reg::PC, pc);
        }
    }

    fn jmp(&mut self, instr: u16) {
        let target = self.reg.get(sr1(instr));
        self.reg.set(Reg::PC, target);
    }

    fn jsr(&mut self, instr: u16) {
        let pc = self.pc();
        self.reg.set(Reg::R7, pc);
        let target = if instr & 0x800 == 0 {
            self.reg.get(sr1(instr))
        } else {
            pc.wrapping_add(sign_extend(instr & 0x7FF, 11))
        };
        self.reg.set(Reg::PC, target);
    }

    fn ld(&mut self, instr: u16, io: &mut impl Io) -> Result<(), Fault> {
        let addr = self.pc().wrapping_add(pc_offset9(instr));
        let val = self.read(addr, io)?;
        self.define(dr(instr), val);
        Ok(())
    }

    fn ldi(&mut self, instr: u16, io: &mut impl Io) -> Result<(), Fault> {
        let addr = self.pc().wrapping_add(pc_offset9(instr));
        let ptr = self.read(addr, io)?;
        let val = self.read(ptr, io)?;
        self.define(dr(instr), val);
        Ok(())
    }

    fn ldr(&mut self, instr: u16, io: &mut impl Io) -> Result<(), Fault> {
        let base = self.reg.get(sr1(instr));
        let addr = base.wrapping_add(sign_extend(instr & 0x3F, 6));
        let val = self.read(addr, io)?;
        self.define(dr(instr), val);
        Ok(())
    }

    fn lea(&mut self, instr: u16) {
        let val = self.pc().wrapping_add(pc_offset9(instr));
        self.define(dr(instr), val);
    }

    fn st(&mut self, instr: u16) {
        let val = self.reg.get(dr(instr));
        let addr = self.pc().wrapping_add(pc_offset9(instr));
        self.mem.write(addr, val);
    }

    fn sti(&mut self, instr: u16, io: &mut impl Io) -> Result<(), Fault> {
        let val = self.reg.get(dr(instr));
        let addr = self.pc().wrapping_add(pc_offset9(instr));
        let ptr = self.read(addr, io)?;
        self.mem.write(ptr, val);
        Ok(())
    }

    fn str(&mut self, instr: u16) {
        let val = self.reg.get(dr(instr));
        let addr = self.reg.get(sr1(instr)).wrapping_add(sign_extend(instr & 0x3F, 6));
        self.mem.write(addr, val);
    }

    fn trap(&mut self, addr: u16, instr: u16, io: &mut impl Io) -> Result<Status, Fault> {
        let vector = (instr & 0xFF) as u8;
        let routine =
            TrapVector::try_from(vector).map_err(|vector| Fault::UnknownTrap { addr, vector })?;
        let pc = self.pc();
        self.reg.set(Reg::R7, pc);
        routine.execute(&mut self.reg, &self.mem, io)
    }
}

/// An interrupted console is a clean stop; anything else is a fault.
fn stop_or_fault(fault: Fault) -> Result<Stop, Fault> {
    match fault {
        Fault::Io(e) if e.kind() == io::ErrorKind::Interrupted => Ok(Stop::Interrupted),
        fault => Err(fault),
    }
}
