use crate::{
    arch::Architecture,
    ir::{Ir, Op},
};

use super::Generator;

pub struct Aarch64AppleDarwin<'a> {
    arch: &'a Architecture,
    ir: &'a Ir,
}

impl<'a> Aarch64AppleDarwin<'a> {
    pub fn new(arch: &'a Architecture, ir: &'a Ir) -> Self {
        Self { arch, ir }
    }
}

impl Generator for Aarch64AppleDarwin<'_> {
    fn arch(&self) -> &Architecture {
        self.arch
    }

    fn ir(&self) -> &Ir {
        self.ir
    }

    fn header(&self) -> &'static str {
        ".global _main\n.align 2\n_main:"
    }

    fn mnemonic(&self, op: Op) -> &'static str {
        match op {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mult => "mul",
            Op::Div => "sdiv",
            Op::Mov => "mov",
            Op::Load => "ldr",
            Op::Store => "str",
            Op::Ret => "ret",
        }
    }

    fn immediate(&self, value: i64) -> String {
        format!("#{}", value)
    }
}
