//! A tiny straight-line compiler backend: programs are built from
//! virtual registers, allocated onto a target's physical registers by
//! linear scan (spilling to the stack when pressure demands it) and
//! rendered as assembly text. A reference interpreter executes the
//! same IR directly and serves as the semantic oracle for the backend.

pub mod arch;
mod codegen;
mod interp;
pub mod ir;
pub mod postfix;

use thiserror::Error;

use crate::ir::Ir;

pub use interp::interpret;

/// Allocate, materialize spills and render `ir` for `triple`. The
/// program is consumed: allocation rewrites it destructively and the
/// result is only meaningful as the returned listing.
pub fn compile(mut ir: Ir, triple: &str) -> Result<String, Error> {
    let arch = arch::lookup(triple)?;
    codegen::reg_alloc::allocate(&mut ir, arch)?;
    codegen::spill::materialize(&mut ir, arch)?;
    codegen::emit(arch, &ir)
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported target: {0}")]
    UnsupportedTarget(String),

    #[error("invalid register id {0}")]
    InvalidRegister(i64),

    #[error("constant pool index {0} out of bounds")]
    ConstantOutOfBounds(usize),

    #[error("malformed interval for register {vreg}: [{start}, {end})")]
    MalformedInterval {
        vreg: u32,
        start: usize,
        end: usize,
    },

    #[error("virtual register {0} is not declared by the program")]
    UnknownVirtualRegister(u32),

    #[error("physical register {0} is not legal when interpreting")]
    PhysicalOperand(i64),

    #[error("stack slot operand is not legal when interpreting")]
    StackOperand,

    #[error("division by zero")]
    DivisionByZero,

    #[error("memory access at {0} is out of bounds")]
    MemoryOutOfBounds(i64),

    #[error("unexpected operand: {0}")]
    UnexpectedOperand(&'static str),

    #[error("parse error: {0}")]
    Parse(String),
}
