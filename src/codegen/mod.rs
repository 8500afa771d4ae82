pub mod aarch64_apple_darwin;
pub(crate) mod liveness;
pub mod reg_alloc;
pub mod spill;
pub mod x86_64_pc_windows_gnu;

use crate::{
    arch::{self, Architecture},
    ir::{Arg, Instruction, Ir, Op, Register},
    Error,
};

use aarch64_apple_darwin::Aarch64AppleDarwin;
use x86_64_pc_windows_gnu::X86_64PcWindowsGnu;

/// Per-target rendering of a fully allocated program. Implementations
/// supply naming and immediate syntax; the line shapes are shared.
///
/// A virtual or stack register here means the allocator or the spill
/// passes were skipped, which is a bug, not an input error.
pub trait Generator {
    fn arch(&self) -> &Architecture;
    fn ir(&self) -> &Ir;

    /// Leading label block of the listing.
    fn header(&self) -> &'static str;
    fn mnemonic(&self, op: Op) -> &'static str;
    fn immediate(&self, value: i64) -> String;

    fn emit(&self) -> Result<String, Error> {
        let mut lines = vec![self.header().to_string()];
        for instruction in &self.ir().instructions {
            lines.push(self.line(instruction)?);
        }
        if !matches!(self.ir().instructions.last(), Some(i) if i.op == Op::Ret) {
            lines.push("  ret".to_string());
        }
        Ok(lines.join("\n") + "\n")
    }

    fn line(&self, instruction: &Instruction) -> Result<String, Error> {
        let mnemonic = self.mnemonic(instruction.op);
        match instruction.op {
            Op::Add | Op::Sub | Op::Mult | Op::Div => Ok(format!(
                "  {} {}, {}, {}",
                mnemonic,
                self.register(instruction.dst)?,
                self.register(instruction.src1)?,
                self.operand(&instruction.src2)?
            )),
            Op::Mov | Op::Load => Ok(format!(
                "  {} {}, {}",
                mnemonic,
                self.register(instruction.dst)?,
                self.operand(&instruction.src2)?
            )),
            Op::Store => Ok(format!(
                "  {} {}, {}",
                mnemonic,
                self.register(instruction.src1)?,
                self.operand(&instruction.src2)?
            )),
            Op::Ret => Ok("  ret".to_string()),
        }
    }

    fn register(&self, register: Register) -> Result<&'static str, Error> {
        match register {
            Register::Physical(id) => self.arch().physical_name(id),
            Register::Virtual(v) => {
                panic!("virtual register {} survived allocation", v)
            }
            Register::Stack(slot) => {
                panic!("stack slot {} survived spill materialization", slot)
            }
            Register::Unused => Err(Error::InvalidRegister(0)),
        }
    }

    fn operand(&self, arg: &Arg) -> Result<String, Error> {
        match arg {
            Arg::Constant(index) => Ok(self.immediate(self.ir().constant(*index)?)),
            Arg::Register(register) => Ok(self.register(*register)?.to_string()),
            Arg::Address { base, offset } => Ok(format!(
                "[{}, {}]",
                self.register(*base)?,
                self.immediate(self.ir().constant(*offset)?)
            )),
            Arg::None => Err(Error::UnexpectedOperand("none")),
        }
    }
}

/// Render the allocated program for the given target.
pub fn emit(arch: &Architecture, ir: &Ir) -> Result<String, Error> {
    match arch.triple {
        arch::AARCH64_APPLE_DARWIN => Aarch64AppleDarwin::new(arch, ir).emit(),
        arch::X86_64_PC_WINDOWS_GNU => X86_64PcWindowsGnu::new(arch, ir).emit(),
        other => Err(Error::UnsupportedTarget(other.to_string())),
    }
}
