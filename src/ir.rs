use std::fmt::{self, Display};

use itertools::Itertools;
use strum::EnumIter;

use crate::Error;

/// Reserved register id rendered as the target's stack pointer.
pub const STACK_POINTER: i32 = -1;
/// Reserved register id rendered as the target's return value register.
pub const RETURN_REGISTER: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Op {
    Add,
    Sub,
    Mult,
    Div,
    Mov,
    Load,
    Store,
    Ret,
}

impl Op {
    /// Stable numeric code used by the diagnostic dump.
    pub fn code(self) -> u8 {
        match self {
            Op::Add => 1,
            Op::Sub => 2,
            Op::Mult => 3,
            Op::Div => 4,
            Op::Mov => 5,
            Op::Load => 6,
            Op::Store => 7,
            Op::Ret => 8,
        }
    }
}

/// A register operand. Programs are built out of `Virtual` registers;
/// `Physical` and `Stack` only appear once the allocator has run,
/// except for the two negative reserved ids which are legal anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Register {
    #[default]
    Unused,
    Virtual(u32),
    Physical(i32),
    Stack(u32),
}

impl Register {
    pub fn stack_pointer() -> Self {
        Register::Physical(STACK_POINTER)
    }

    pub fn return_register() -> Self {
        Register::Physical(RETURN_REGISTER)
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Register::Virtual(_))
    }

    /// Raw integer for the diagnostic dump. Not reversible.
    pub fn raw(&self) -> i64 {
        match self {
            Register::Unused => 0,
            Register::Virtual(v) => *v as i64,
            Register::Physical(p) => *p as i64,
            Register::Stack(s) => *s as i64,
        }
    }

    pub fn to_arg(self) -> Arg {
        Arg::Register(self)
    }

    /// Address with this register as base. `offset` is a constant pool
    /// index, never an inline literal.
    pub fn to_address(self, offset: usize) -> Arg {
        Arg::Address { base: self, offset }
    }
}

/// Second-source operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Arg {
    #[default]
    None,
    /// Index into the program's constant pool.
    Constant(usize),
    Register(Register),
    /// Base register plus an offset resolved through the constant pool.
    Address { base: Register, offset: usize },
}

impl Arg {
    pub fn raw(&self) -> i64 {
        match self {
            Arg::None => 0,
            Arg::Constant(index) => *index as i64,
            Arg::Register(register) => register.raw(),
            Arg::Address { base, .. } => base.raw(),
        }
    }
}

/// `mov`/`load` use `dst` and `src2`, `store` uses `src1` and `src2`,
/// `ret` uses nothing; everything else uses all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub dst: Register,
    pub src1: Register,
    pub src2: Arg,
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.op.code(),
            self.dst.raw(),
            self.src1.raw(),
            self.src2.raw()
        )
    }
}

/// A straight-line program: instructions, a deduplicated constant pool
/// and the virtual register counter. Register id 0 is never handed out.
#[derive(Debug, Clone)]
pub struct Ir {
    pub instructions: Vec<Instruction>,
    pub constants: Vec<i64>,
    registers_len: u32,
}

impl Ir {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            constants: Vec::new(),
            registers_len: 1,
        }
    }

    /// Number of declared registers, including the unused 0th slot.
    pub fn registers_len(&self) -> u32 {
        self.registers_len
    }

    /// Intern a constant: the existing index if the value is already
    /// pooled, a fresh one otherwise.
    pub fn intern(&mut self, value: i64) -> usize {
        match self.constants.iter().position(|&c| c == value) {
            Some(index) => index,
            None => {
                self.constants.push(value);
                self.constants.len() - 1
            }
        }
    }

    pub fn constant(&self, index: usize) -> Result<i64, Error> {
        self.constants
            .get(index)
            .copied()
            .ok_or(Error::ConstantOutOfBounds(index))
    }

    pub fn new_virtual_register(&mut self) -> Register {
        let register = Register::Virtual(self.registers_len);
        self.registers_len += 1;
        register
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn move_constant(&mut self, dst: Register, value: i64) {
        let index = self.intern(value);
        self.push(Instruction {
            op: Op::Mov,
            dst,
            src1: Register::Unused,
            src2: Arg::Constant(index),
        });
    }

    pub fn move_register(&mut self, dst: Register, src: Register) {
        self.push(Instruction {
            op: Op::Mov,
            dst,
            src1: Register::Unused,
            src2: src.to_arg(),
        });
    }

    pub fn add_registers(&mut self, dst: Register, src1: Register, src2: Register) {
        self.binary(Op::Add, dst, src1, src2);
    }

    pub fn sub_registers(&mut self, dst: Register, src1: Register, src2: Register) {
        self.binary(Op::Sub, dst, src1, src2);
    }

    pub fn mult_registers(&mut self, dst: Register, src1: Register, src2: Register) {
        self.binary(Op::Mult, dst, src1, src2);
    }

    pub fn div_registers(&mut self, dst: Register, src1: Register, src2: Register) {
        self.binary(Op::Div, dst, src1, src2);
    }

    fn binary(&mut self, op: Op, dst: Register, src1: Register, src2: Register) {
        self.push(Instruction {
            op,
            dst,
            src1,
            src2: src2.to_arg(),
        });
    }

    pub fn load(&mut self, dst: Register, addr: Arg) -> Result<(), Error> {
        if !matches!(addr, Arg::Address { .. }) {
            return Err(Error::UnexpectedOperand("load needs an address"));
        }
        self.push(Instruction {
            op: Op::Load,
            dst,
            src1: Register::Unused,
            src2: addr,
        });
        Ok(())
    }

    pub fn store(&mut self, src: Register, addr: Arg) -> Result<(), Error> {
        if !matches!(addr, Arg::Address { .. }) {
            return Err(Error::UnexpectedOperand("store needs an address"));
        }
        self.push(Instruction {
            op: Op::Store,
            dst: Register::Unused,
            src1: src,
            src2: addr,
        });
        Ok(())
    }

    /// Move `src` into the reserved return value register.
    pub fn set_return(&mut self, src: Register) {
        self.move_register(Register::return_register(), src);
    }

    pub fn ret(&mut self) {
        self.push(Instruction {
            op: Op::Ret,
            dst: Register::Unused,
            src1: Register::Unused,
            src2: Arg::None,
        });
    }
}

impl Default for Ir {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Ir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{}", instruction)?;
        }
        write!(f, "constants: {}", self.constants.iter().join(" "))
    }
}
