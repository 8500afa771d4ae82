use crate::{
    arch::Architecture,
    ir::{Ir, Op},
};

use super::Generator;

pub struct X86_64PcWindowsGnu<'a> {
    arch: &'a Architecture,
    ir: &'a Ir,
}

impl<'a> X86_64PcWindowsGnu<'a> {
    pub fn new(arch: &'a Architecture, ir: &'a Ir) -> Self {
        Self { arch, ir }
    }
}

impl Generator for X86_64PcWindowsGnu<'_> {
    fn arch(&self) -> &Architecture {
        self.arch
    }

    fn ir(&self) -> &Ir {
        self.ir
    }

    fn header(&self) -> &'static str {
        "section .text\n\tglobal main\n\nmain:"
    }

    fn mnemonic(&self, op: Op) -> &'static str {
        match op {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mult => "mul",
            Op::Div => "div",
            Op::Mov => "mov",
            Op::Load => "ldr",
            Op::Store => "str",
            Op::Ret => "ret",
        }
    }

    fn immediate(&self, value: i64) -> String {
        value.to_string()
    }
}
