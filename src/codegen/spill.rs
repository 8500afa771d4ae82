use crate::{
    arch::Architecture,
    ir::{Arg, Instruction, Ir, Op, Register},
    Error,
};

/// Turn stack slot assignments into real stack traffic: size the
/// frame, wrap spilled operands in scratch register loads and stores,
/// and bracket the program with stack pointer adjustment. Afterwards
/// no instruction references a stack slot directly.
pub fn materialize(ir: &mut Ir, arch: &Architecture) -> Result<(), Error> {
    let frame = frame_size(ir, arch);
    if frame > 0 {
        let offset = ir.intern(frame);
        ir.instructions.insert(
            0,
            Instruction {
                op: Op::Sub,
                dst: Register::stack_pointer(),
                src1: Register::stack_pointer(),
                src2: Arg::Constant(offset),
            },
        );
    }

    insert_spill_code(ir, arch);

    if frame > 0 {
        let offset = ir.intern(frame);
        let teardown = Instruction {
            op: Op::Add,
            dst: Register::stack_pointer(),
            src1: Register::stack_pointer(),
            src2: Arg::Constant(offset),
        };
        // Restore the stack pointer before an explicit trailing return.
        match ir.instructions.last() {
            Some(last) if last.op == Op::Ret => {
                let at = ir.instructions.len() - 1;
                ir.instructions.insert(at, teardown);
            }
            _ => ir.instructions.push(teardown),
        }
    }

    Ok(())
}

/// Bytes needed for the highest slot in use, rounded up to the
/// target's stack alignment. Zero when nothing spilled.
fn frame_size(ir: &Ir, arch: &Architecture) -> i64 {
    let mut max_slot: u32 = 0;
    for instruction in &ir.instructions {
        for register in [instruction.dst, instruction.src1] {
            if let Register::Stack(slot) = register {
                max_slot = max_slot.max(slot);
            }
        }
        match instruction.src2 {
            Arg::Register(Register::Stack(slot)) => max_slot = max_slot.max(slot),
            Arg::Address {
                base: Register::Stack(slot),
                ..
            } => max_slot = max_slot.max(slot),
            _ => {}
        }
    }

    let bytes = max_slot as i64 * arch.word_size as i64;
    let align = arch.stack_align as i64;
    (bytes + align - 1) / align * align
}

fn insert_spill_code(ir: &mut Ir, arch: &Architecture) {
    let scratch0 = Register::Physical(arch.scratch(0));
    let scratch1 = Register::Physical(arch.scratch(1));
    let word = arch.word_size as i64;

    let instructions = std::mem::take(&mut ir.instructions);
    let mut out = Vec::with_capacity(instructions.len());

    for mut instruction in instructions {
        if let Register::Stack(slot) = instruction.src1 {
            out.push(reload(ir, scratch0, slot, word));
            instruction.src1 = scratch0;
        }
        match instruction.src2 {
            Arg::Register(Register::Stack(slot)) => {
                out.push(reload(ir, scratch1, slot, word));
                instruction.src2 = Arg::Register(scratch1);
            }
            Arg::Address {
                base: Register::Stack(slot),
                offset,
            } => {
                out.push(reload(ir, scratch1, slot, word));
                instruction.src2 = Arg::Address {
                    base: scratch1,
                    offset,
                };
            }
            _ => {}
        }

        let spilled_dst = match instruction.dst {
            Register::Stack(slot) => {
                instruction.dst = scratch0;
                Some(slot)
            }
            _ => None,
        };

        out.push(instruction);

        if let Some(slot) = spilled_dst {
            let offset = ir.intern(slot_offset(slot, word));
            out.push(Instruction {
                op: Op::Store,
                dst: Register::Unused,
                src1: scratch0,
                src2: Register::stack_pointer().to_address(offset),
            });
        }
    }

    ir.instructions = out;
}

fn reload(ir: &mut Ir, scratch: Register, slot: u32, word: i64) -> Instruction {
    let offset = ir.intern(slot_offset(slot, word));
    Instruction {
        op: Op::Load,
        dst: scratch,
        src1: Register::Unused,
        src2: Register::stack_pointer().to_address(offset),
    }
}

fn slot_offset(slot: u32, word: i64) -> i64 {
    (slot as i64 - 1) * word
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch;

    fn no_stack_operands(ir: &Ir) -> bool {
        ir.instructions.iter().all(|i| {
            !matches!(i.dst, Register::Stack(_))
                && !matches!(i.src1, Register::Stack(_))
                && !matches!(i.src2, Arg::Register(Register::Stack(_)))
                && !matches!(
                    i.src2,
                    Arg::Address {
                        base: Register::Stack(_),
                        ..
                    }
                )
        })
    }

    #[test]
    fn program_without_spills_is_untouched() {
        let arch = arch::lookup(arch::AARCH64_APPLE_DARWIN).unwrap();
        let mut ir = Ir::new();
        let seven = ir.intern(7);
        ir.push(Instruction {
            op: Op::Mov,
            dst: Register::Physical(1),
            src1: Register::Unused,
            src2: Arg::Constant(seven),
        });
        ir.ret();
        let before = ir.instructions.clone();

        materialize(&mut ir, arch).unwrap();
        assert_eq!(ir.instructions, before);
    }

    #[test]
    fn frame_is_sized_and_aligned() {
        let arch = arch::lookup(arch::AARCH64_APPLE_DARWIN).unwrap();
        let mut ir = Ir::new();
        let seven = ir.intern(7);
        ir.push(Instruction {
            op: Op::Mov,
            dst: Register::Stack(1),
            src1: Register::Unused,
            src2: Arg::Constant(seven),
        });
        ir.ret();

        materialize(&mut ir, arch).unwrap();
        // One 8-byte slot rounds up to the 16-byte alignment.
        let first = &ir.instructions[0];
        assert_eq!(first.op, Op::Sub);
        assert_eq!(first.dst, Register::stack_pointer());
        assert_eq!(ir.constant(expect_constant(first)).unwrap(), 16);
    }

    #[test]
    fn spilled_destination_goes_through_a_scratch_store() {
        let arch = arch::lookup(arch::AARCH64_APPLE_DARWIN).unwrap();
        let scratch0 = Register::Physical(arch.scratch(0));
        let mut ir = Ir::new();
        let seven = ir.intern(7);
        ir.push(Instruction {
            op: Op::Mov,
            dst: Register::Stack(1),
            src1: Register::Unused,
            src2: Arg::Constant(seven),
        });
        ir.ret();

        materialize(&mut ir, arch).unwrap();
        assert!(no_stack_operands(&ir));

        // sub sp / mov scratch / str scratch / add sp / ret
        assert_eq!(ir.instructions[1].dst, scratch0);
        let store = &ir.instructions[2];
        assert_eq!(store.op, Op::Store);
        assert_eq!(store.src1, scratch0);
        assert_eq!(
            store.src2,
            Register::stack_pointer().to_address(ir.constants.iter().position(|&c| c == 0).unwrap())
        );
    }

    #[test]
    fn both_spilled_sources_use_distinct_scratch_registers() {
        let arch = arch::lookup(arch::AARCH64_APPLE_DARWIN).unwrap();
        let scratch0 = Register::Physical(arch.scratch(0));
        let scratch1 = Register::Physical(arch.scratch(1));
        let mut ir = Ir::new();
        ir.push(Instruction {
            op: Op::Add,
            dst: Register::Physical(1),
            src1: Register::Stack(1),
            src2: Arg::Register(Register::Stack(2)),
        });
        ir.ret();

        materialize(&mut ir, arch).unwrap();
        assert!(no_stack_operands(&ir));

        // sub sp / ldr scratch0 / ldr scratch1 / add / add sp / ret
        assert_eq!(ir.instructions[1].op, Op::Load);
        assert_eq!(ir.instructions[1].dst, scratch0);
        assert_eq!(ir.instructions[2].op, Op::Load);
        assert_eq!(ir.instructions[2].dst, scratch1);
        let add = &ir.instructions[3];
        assert_eq!(add.src1, scratch0);
        assert_eq!(add.src2, Arg::Register(scratch1));
    }

    #[test]
    fn spilled_address_bases_reload_through_scratch() {
        let arch = arch::lookup(arch::AARCH64_APPLE_DARWIN).unwrap();
        let scratch0 = Register::Physical(arch.scratch(0));
        let scratch1 = Register::Physical(arch.scratch(1));
        let mut ir = Ir::new();
        let offset = ir.intern(0);
        ir.push(Instruction {
            op: Op::Store,
            dst: Register::Unused,
            src1: Register::Stack(1),
            src2: Register::Stack(2).to_address(offset),
        });
        ir.push(Instruction {
            op: Op::Load,
            dst: Register::Physical(1),
            src1: Register::Unused,
            src2: Register::Stack(2).to_address(offset),
        });
        ir.ret();

        materialize(&mut ir, arch).unwrap();
        assert!(no_stack_operands(&ir));

        // sub sp / ldr scratch0 / ldr scratch1 / str / ldr scratch1 /
        // ldr / add sp / ret
        assert_eq!(ir.instructions[1].op, Op::Load);
        assert_eq!(ir.instructions[1].dst, scratch0);
        assert_eq!(ir.instructions[2].op, Op::Load);
        assert_eq!(ir.instructions[2].dst, scratch1);
        let store = &ir.instructions[3];
        assert_eq!(store.op, Op::Store);
        assert_eq!(store.src1, scratch0);
        assert_eq!(store.src2, scratch1.to_address(offset));
        assert_eq!(ir.instructions[4].dst, scratch1);
        let load = &ir.instructions[5];
        assert_eq!(load.op, Op::Load);
        assert_eq!(load.dst, Register::Physical(1));
        assert_eq!(load.src2, scratch1.to_address(offset));
    }

    #[test]
    fn teardown_lands_before_a_trailing_return() {
        let arch = arch::lookup(arch::AARCH64_APPLE_DARWIN).unwrap();
        let mut ir = Ir::new();
        let seven = ir.intern(7);
        ir.push(Instruction {
            op: Op::Mov,
            dst: Register::Stack(1),
            src1: Register::Unused,
            src2: Arg::Constant(seven),
        });
        ir.ret();

        materialize(&mut ir, arch).unwrap();
        let len = ir.instructions.len();
        assert_eq!(ir.instructions[len - 1].op, Op::Ret);
        assert_eq!(ir.instructions[len - 2].op, Op::Add);
        assert_eq!(ir.instructions[len - 2].dst, Register::stack_pointer());
    }

    #[test]
    fn teardown_is_appended_when_there_is_no_return() {
        let arch = arch::lookup(arch::AARCH64_APPLE_DARWIN).unwrap();
        let mut ir = Ir::new();
        let seven = ir.intern(7);
        ir.push(Instruction {
            op: Op::Mov,
            dst: Register::Stack(1),
            src1: Register::Unused,
            src2: Arg::Constant(seven),
        });

        materialize(&mut ir, arch).unwrap();
        let last = ir.instructions.last().unwrap();
        assert_eq!(last.op, Op::Add);
        assert_eq!(last.dst, Register::stack_pointer());
    }

    #[test]
    fn slot_addresses_step_by_word_size() {
        let arch = arch::lookup(arch::AARCH64_APPLE_DARWIN).unwrap();
        let mut ir = Ir::new();
        let seven = ir.intern(7);
        ir.push(Instruction {
            op: Op::Mov,
            dst: Register::Stack(3),
            src1: Register::Unused,
            src2: Arg::Constant(seven),
        });

        materialize(&mut ir, arch).unwrap();
        let store = &ir.instructions[2];
        assert_eq!(store.op, Op::Store);
        match store.src2 {
            Arg::Address { offset, .. } => assert_eq!(ir.constant(offset).unwrap(), 16),
            other => panic!("expected an address operand, got {:?}", other),
        }
    }

    fn expect_constant(instruction: &Instruction) -> usize {
        match instruction.src2 {
            Arg::Constant(index) => index,
            other => panic!("expected a constant operand, got {:?}", other),
        }
    }
}
