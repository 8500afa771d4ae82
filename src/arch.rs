use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::{
    ir::{RETURN_REGISTER, STACK_POINTER},
    Error,
};

pub const AARCH64_APPLE_DARWIN: &str = "aarch64-apple-darwin";
pub const X86_64_PC_WINDOWS_GNU: &str = "x86_64-pc-windows-gnu";

/// General purpose registers withheld from the allocator and reserved
/// for spill loads and stores. Always the tail of the register list.
pub const SCRATCH_REGISTERS: usize = 2;

/// Per-target register naming and layout constants. Immutable; looked
/// up from the registry by triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Architecture {
    pub triple: &'static str,
    /// General purpose registers. Physical id `n` names `registers[n - 1]`.
    pub registers: &'static [&'static str],
    pub return_register: &'static str,
    pub stack_pointer: &'static str,
    /// Integer width in bytes.
    pub word_size: u32,
    /// Required stack alignment in bytes.
    pub stack_align: u32,
}

static ARCHITECTURES: Lazy<HashMap<&'static str, Architecture>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        AARCH64_APPLE_DARWIN,
        Architecture {
            triple: AARCH64_APPLE_DARWIN,
            registers: &["X9", "X10", "X11", "X12", "X13", "X14", "X15"],
            return_register: "X0",
            stack_pointer: "sp",
            word_size: 8,
            stack_align: 16,
        },
    );
    m.insert(
        X86_64_PC_WINDOWS_GNU,
        Architecture {
            triple: X86_64_PC_WINDOWS_GNU,
            registers: &["rbx", "r10", "r11", "r12", "r13", "r14", "r15"],
            return_register: "rax",
            stack_pointer: "rsp",
            word_size: 8,
            stack_align: 16,
        },
    );
    m
});

pub fn lookup(triple: &str) -> Result<&'static Architecture, Error> {
    ARCHITECTURES
        .get(triple)
        .ok_or_else(|| Error::UnsupportedTarget(triple.to_string()))
}

impl Architecture {
    /// Target name of a physical register id. Id 0 and negative ids
    /// outside the two reserved sentinels are invalid.
    pub fn physical_name(&self, id: i32) -> Result<&'static str, Error> {
        match id {
            0 => Err(Error::InvalidRegister(0)),
            STACK_POINTER => Ok(self.stack_pointer),
            RETURN_REGISTER => Ok(self.return_register),
            id if id < 0 => Err(Error::InvalidRegister(id as i64)),
            id => self
                .registers
                .get(id as usize - 1)
                .copied()
                .ok_or(Error::InvalidRegister(id as i64)),
        }
    }

    /// Registers the allocator may hand out.
    pub fn usable_registers(&self) -> usize {
        self.registers.len() - SCRATCH_REGISTERS
    }

    /// Physical id of scratch register `n` (0 or 1).
    pub fn scratch(&self, n: usize) -> i32 {
        debug_assert!(n < SCRATCH_REGISTERS);
        (self.usable_registers() + 1 + n) as i32
    }
}
