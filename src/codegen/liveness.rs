use crate::ir::{Arg, Ir, Register};

/// Liveness interval of one virtual register, half open `[start, end)`
/// in instruction indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub vreg: u32,
    pub start: usize,
    pub end: usize,
}

/// One interval per declared register, indexed by register id (index 0
/// stays empty). A register never referenced keeps
/// `start == instruction count, end == 0`.
pub fn intervals(ir: &Ir) -> Vec<Interval> {
    let len = ir.instructions.len();
    let mut intervals: Vec<Interval> = (0..ir.registers_len())
        .map(|vreg| Interval {
            vreg,
            start: len,
            end: 0,
        })
        .collect();

    for (i, instruction) in ir.instructions.iter().enumerate() {
        let mut touch = |register: &Register| {
            if let Register::Virtual(v) = register {
                if let Some(interval) = intervals.get_mut(*v as usize) {
                    interval.start = interval.start.min(i);
                    interval.end = i + 1;
                }
            }
        };
        touch(&instruction.dst);
        touch(&instruction.src1);
        match &instruction.src2 {
            Arg::Register(register) => touch(register),
            Arg::Address { base, .. } => touch(base),
            Arg::Constant(_) | Arg::None => {}
        }
    }

    intervals
}

/// Sorted interval queue. The unprocessed queue orders by ascending
/// start, the active queue by ascending end. Insertion is stable:
/// equal keys keep arrival order, so the tail is the latest-inserted
/// interval among those sharing the maximal key.
#[derive(Debug)]
pub struct IntervalQueue {
    intervals: Vec<Interval>,
    by_end: bool,
}

impl IntervalQueue {
    pub fn by_start() -> Self {
        Self {
            intervals: Vec::new(),
            by_end: false,
        }
    }

    pub fn by_end() -> Self {
        Self {
            intervals: Vec::new(),
            by_end: true,
        }
    }

    pub fn push(&mut self, interval: Interval) {
        let pos = if self.by_end {
            self.intervals.partition_point(|v| v.end <= interval.end)
        } else {
            self.intervals
                .partition_point(|v| v.start <= interval.start)
        };
        self.intervals.insert(pos, interval);
    }

    pub fn pop(&mut self) -> Option<Interval> {
        if self.intervals.is_empty() {
            None
        } else {
            Some(self.intervals.remove(0))
        }
    }

    pub fn pop_last(&mut self) -> Option<Interval> {
        self.intervals.pop()
    }

    pub fn peek(&self) -> Option<&Interval> {
        self.intervals.first()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
