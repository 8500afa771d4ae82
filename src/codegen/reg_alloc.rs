use std::collections::VecDeque;

use crate::{
    arch::Architecture,
    ir::{Arg, Ir, Register},
    Error,
};

use super::liveness::{self, IntervalQueue};

/// Where a virtual register ends up after the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    Register(i32),
    Stack(u32),
}

/// Linear scan register allocation. Rewrites the program in place so
/// that no virtual register survives: each one becomes either a
/// physical register or a stack slot to be materialized by the spill
/// passes. Scratch registers never enter the free pool.
pub fn allocate(ir: &mut Ir, arch: &Architecture) -> Result<(), Error> {
    validate(ir)?;

    let mut unprocessed = IntervalQueue::by_start();
    for interval in liveness::intervals(ir) {
        if interval.end == 0 {
            // never referenced
            continue;
        }
        if interval.start > interval.end {
            return Err(Error::MalformedInterval {
                vreg: interval.vreg,
                start: interval.start,
                end: interval.end,
            });
        }
        unprocessed.push(interval);
    }

    let mut free: VecDeque<i32> = (1..=arch.usable_registers() as i32).collect();
    let mut active = IntervalQueue::by_end();
    let mut assignments: Vec<Option<Assignment>> = vec![None; ir.registers_len() as usize];
    let mut next_slot: u32 = 0;

    while let Some(current) = unprocessed.pop() {
        // Expire actives that ended before the current interval starts.
        while let Some(peek) = active.peek() {
            if peek.end > current.start {
                break;
            }
            let expired = active.pop().unwrap();
            match assignments[expired.vreg as usize] {
                Some(Assignment::Register(id)) => free.push_back(id),
                _ => unreachable!("active interval without a register assignment"),
            }
        }

        if let Some(id) = free.pop_front() {
            assignments[current.vreg as usize] = Some(Assignment::Register(id));
            active.push(current);
        } else {
            // Spill. The active interval expiring last gives up its
            // register; it gets a fresh stack slot instead.
            next_slot += 1;
            match active.pop_last() {
                Some(victim) => {
                    let id = match assignments[victim.vreg as usize] {
                        Some(Assignment::Register(id)) => id,
                        _ => unreachable!("active interval without a register assignment"),
                    };
                    assignments[victim.vreg as usize] = Some(Assignment::Stack(next_slot));
                    assignments[current.vreg as usize] = Some(Assignment::Register(id));
                    active.push(current);
                }
                None => {
                    // No registers at all on this target.
                    assignments[current.vreg as usize] = Some(Assignment::Stack(next_slot));
                }
            }
        }
    }

    rewrite(ir, &assignments)
}

/// Before allocation every referenced register must be virtual, unused
/// or one of the reserved negative sentinels.
fn validate(ir: &Ir) -> Result<(), Error> {
    let check = |register: &Register| match register {
        Register::Virtual(0) => Err(Error::InvalidRegister(0)),
        Register::Virtual(v) if *v >= ir.registers_len() => Err(Error::UnknownVirtualRegister(*v)),
        Register::Physical(id) if *id >= 0 => Err(Error::InvalidRegister(*id as i64)),
        Register::Physical(id) if *id < crate::ir::RETURN_REGISTER => {
            Err(Error::InvalidRegister(*id as i64))
        }
        Register::Stack(slot) => Err(Error::InvalidRegister(*slot as i64)),
        _ => Ok(()),
    };

    for instruction in &ir.instructions {
        check(&instruction.dst)?;
        check(&instruction.src1)?;
        match &instruction.src2 {
            Arg::Register(register) => check(register)?,
            Arg::Address { base, .. } => check(base)?,
            Arg::Constant(_) | Arg::None => {}
        }
    }
    Ok(())
}

fn rewrite(ir: &mut Ir, assignments: &[Option<Assignment>]) -> Result<(), Error> {
    for instruction in &mut ir.instructions {
        instruction.dst = resolve(instruction.dst, assignments)?;
        instruction.src1 = resolve(instruction.src1, assignments)?;
        instruction.src2 = match instruction.src2 {
            Arg::Register(register) => Arg::Register(resolve(register, assignments)?),
            Arg::Address { base, offset } => Arg::Address {
                base: resolve(base, assignments)?,
                offset,
            },
            other => other,
        };
    }
    Ok(())
}

fn resolve(register: Register, assignments: &[Option<Assignment>]) -> Result<Register, Error> {
    match register {
        Register::Virtual(v) => match assignments.get(v as usize).copied().flatten() {
            Some(Assignment::Register(id)) => Ok(Register::Physical(id)),
            Some(Assignment::Stack(slot)) => Ok(Register::Stack(slot)),
            None => Err(Error::UnknownVirtualRegister(v)),
        },
        other => Ok(other),
    }
}
