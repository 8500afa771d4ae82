use crate::{
    ir::{Arg, Instruction, Ir, Op, Register, RETURN_REGISTER},
    Error,
};

const MEMORY_SIZE: usize = 1024;

/// Execute a pre-allocation program directly over its virtual
/// registers. Serves as the semantic oracle for the backend: the only
/// physical register it accepts is the reserved return value sentinel.
///
/// `ret` stops execution and yields the return value cell. A program
/// that runs off the end instead yields the last register assigned,
/// zero if there is none.
pub fn interpret(ir: &Ir) -> Result<i64, Error> {
    let mut runtime = Runtime {
        registers: vec![0; ir.registers_len() as usize],
        memory: vec![0; MEMORY_SIZE],
        return_value: 0,
        return_written: false,
    };
    let mut last_assigned: Option<u32> = None;

    for instruction in &ir.instructions {
        match instruction.op {
            Op::Add | Op::Sub | Op::Mult | Op::Div => {
                runtime.arithmetic(ir, instruction)?;
                last_assigned = track(instruction.dst, last_assigned);
            }
            Op::Mov => {
                runtime.mov(ir, instruction)?;
                last_assigned = track(instruction.dst, last_assigned);
            }
            Op::Load => {
                runtime.load(ir, instruction)?;
                last_assigned = track(instruction.dst, last_assigned);
            }
            Op::Store => runtime.store(ir, instruction)?,
            Op::Ret => return Ok(runtime.return_value),
        }
    }

    if runtime.return_written {
        Ok(runtime.return_value)
    } else {
        match last_assigned {
            Some(v) => runtime.read(Register::Virtual(v)),
            None => Ok(0),
        }
    }
}

fn track(dst: Register, last: Option<u32>) -> Option<u32> {
    match dst {
        Register::Virtual(v) => Some(v),
        _ => last,
    }
}

struct Runtime {
    registers: Vec<i64>,
    memory: Vec<u8>,
    return_value: i64,
    return_written: bool,
}

impl Runtime {
    fn read(&self, register: Register) -> Result<i64, Error> {
        match register {
            Register::Virtual(0) => Err(Error::InvalidRegister(0)),
            Register::Virtual(v) => self
                .registers
                .get(v as usize)
                .copied()
                .ok_or(Error::UnknownVirtualRegister(v)),
            Register::Physical(RETURN_REGISTER) => Ok(self.return_value),
            Register::Physical(id) => Err(Error::PhysicalOperand(id as i64)),
            Register::Stack(_) => Err(Error::StackOperand),
            Register::Unused => Err(Error::InvalidRegister(0)),
        }
    }

    fn write(&mut self, register: Register, value: i64) -> Result<(), Error> {
        match register {
            Register::Virtual(0) => Err(Error::InvalidRegister(0)),
            Register::Virtual(v) => {
                let cell = self
                    .registers
                    .get_mut(v as usize)
                    .ok_or(Error::UnknownVirtualRegister(v))?;
                *cell = value;
                Ok(())
            }
            Register::Physical(RETURN_REGISTER) => {
                self.return_value = value;
                self.return_written = true;
                Ok(())
            }
            Register::Physical(id) => Err(Error::PhysicalOperand(id as i64)),
            Register::Stack(_) => Err(Error::StackOperand),
            Register::Unused => Err(Error::InvalidRegister(0)),
        }
    }

    /// Constant or register value; addresses are only legal on
    /// `load`/`store`.
    fn value(&self, ir: &Ir, arg: &Arg) -> Result<i64, Error> {
        match arg {
            Arg::Constant(index) => ir.constant(*index),
            Arg::Register(register) => self.read(*register),
            Arg::Address { .. } => Err(Error::UnexpectedOperand("address")),
            Arg::None => Err(Error::UnexpectedOperand("none")),
        }
    }

    fn arithmetic(&mut self, ir: &Ir, instruction: &Instruction) -> Result<(), Error> {
        let lhs = self.read(instruction.src1)?;
        let rhs = self.value(ir, &instruction.src2)?;
        let result = match instruction.op {
            Op::Add => lhs.wrapping_add(rhs),
            Op::Sub => lhs.wrapping_sub(rhs),
            Op::Mult => lhs.wrapping_mul(rhs),
            Op::Div => {
                if rhs == 0 {
                    return Err(Error::DivisionByZero);
                }
                lhs.wrapping_div(rhs)
            }
            _ => unreachable!("not an arithmetic op"),
        };
        self.write(instruction.dst, result)
    }

    fn mov(&mut self, ir: &Ir, instruction: &Instruction) -> Result<(), Error> {
        if instruction.src1 != Register::Unused {
            return Err(Error::UnexpectedOperand("mov takes no first source"));
        }
        let value = self.value(ir, &instruction.src2)?;
        self.write(instruction.dst, value)
    }

    fn load(&mut self, ir: &Ir, instruction: &Instruction) -> Result<(), Error> {
        let addr = self.address(ir, &instruction.src2)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.memory[addr..addr + 8]);
        self.write(instruction.dst, i64::from_be_bytes(bytes))
    }

    fn store(&mut self, ir: &Ir, instruction: &Instruction) -> Result<(), Error> {
        let addr = self.address(ir, &instruction.src2)?;
        let value = self.read(instruction.src1)?;
        self.memory[addr..addr + 8].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Bounds-checked byte address of an 8-byte access.
    fn address(&self, ir: &Ir, arg: &Arg) -> Result<usize, Error> {
        let (base, offset) = match arg {
            Arg::Address { base, offset } => (base, offset),
            _ => return Err(Error::UnexpectedOperand("memory access needs an address")),
        };
        let addr = self.read(*base)?.wrapping_add(ir.constant(*offset)?);
        if addr < 0 || addr as usize + 8 > MEMORY_SIZE {
            return Err(Error::MemoryOutOfBounds(addr));
        }
        Ok(addr as usize)
    }
}
