//! The operator node record and the static per-opcode descriptor table.

use crate::value::Value;

/// Every operator the interpreter understands, plus the `End` sentinel that
/// terminates a `Sequence` body (spec §9: flat pre-order array layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    End = 0,

    Read,
    WriteZero,
    WriteOne,
    WriteRand,
    Erase,
    Length,
    Offset,

    Print,
    Newline,
    Format,
    Printf,
    Bps,

    Sequence,
    Repeat,

    OffFixed,
    OffLin,
    OffRand,
    LenPow2,
    LenFixed,

    Reduce,
    Drop,
}

/// How a sequence of `Ns`/`Bps` samples collapses to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Min,
    Max,
    Avg,
    Total,
    Ignore,
}

bitflags::bitflags! {
    /// Which of an operator's parameter slots must be present (non-default).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamMask: u8 {
        const NUM    = 0b0001;
        const VAL    = 0b0010;
        const STRING = 0b0100;
        const AGG    = 0b1000;
    }
}

/// A single node in the flat pre-order program array.
///
/// `result`/`size_x`/`size_y` are scratch fields filled during execution and
/// cleared once the parent consumes them (spec §3 "Operator node" lifecycle:
/// Unattached -> Allocated -> Filled -> Formatted/Reduced -> Consumed ->
/// Unattached).
#[derive(Debug, Clone)]
pub struct OpNode {
    pub opcode: Opcode,
    pub num: Option<u32>,
    pub val: Option<i64>,
    pub string: Option<String>,
    pub agg: Option<Aggregate>,

    pub result: Value,
    pub size_x: u32,
    pub size_y: u32,
}

impl OpNode {
    fn bare(opcode: Opcode) -> Self {
        Self {
            opcode,
            num: None,
            val: None,
            string: None,
            agg: None,
            result: Value::None,
            size_x: 0,
            size_y: 0,
        }
    }

    /// Reset the scratch fields after a parent has moved the result out.
    pub fn consume(&mut self) -> Value {
        self.size_x = 0;
        self.size_y = 0;
        std::mem::replace(&mut self.result, Value::None)
    }

    pub fn end() -> Self {
        Self::bare(Opcode::End)
    }
    pub fn read() -> Self {
        Self::bare(Opcode::Read)
    }
    pub fn write_zero() -> Self {
        Self::bare(Opcode::WriteZero)
    }
    pub fn write_one() -> Self {
        Self::bare(Opcode::WriteOne)
    }
    pub fn write_rand() -> Self {
        Self::bare(Opcode::WriteRand)
    }
    pub fn erase() -> Self {
        Self::bare(Opcode::Erase)
    }
    pub fn length() -> Self {
        Self::bare(Opcode::Length)
    }
    pub fn offset() -> Self {
        Self::bare(Opcode::Offset)
    }
    pub fn print(s: impl Into<String>) -> Self {
        Self {
            string: Some(s.into()),
            ..Self::bare(Opcode::Print)
        }
    }
    pub fn newline() -> Self {
        Self::bare(Opcode::Newline)
    }
    pub fn format() -> Self {
        Self::bare(Opcode::Format)
    }
    pub fn printf() -> Self {
        Self::bare(Opcode::Printf)
    }
    pub fn bps() -> Self {
        Self::bare(Opcode::Bps)
    }
    pub fn sequence(num: u32) -> Self {
        Self {
            num: Some(num),
            ..Self::bare(Opcode::Sequence)
        }
    }
    pub fn repeat(num: u32) -> Self {
        Self {
            num: Some(num),
            ..Self::bare(Opcode::Repeat)
        }
    }
    pub fn off_fixed(val: i64) -> Self {
        Self {
            val: Some(val),
            ..Self::bare(Opcode::OffFixed)
        }
    }
    pub fn off_lin(num: u32, val: i64) -> Self {
        Self {
            num: Some(num),
            val: Some(val),
            ..Self::bare(Opcode::OffLin)
        }
    }
    pub fn off_rand(num: u32, val: i64) -> Self {
        Self {
            num: Some(num),
            val: Some(val),
            ..Self::bare(Opcode::OffRand)
        }
    }
    pub fn len_pow2(num: u32, val: i64) -> Self {
        Self {
            num: Some(num),
            val: Some(val),
            ..Self::bare(Opcode::LenPow2)
        }
    }
    pub fn len_fixed(val: i64) -> Self {
        Self {
            val: Some(val),
            ..Self::bare(Opcode::LenFixed)
        }
    }
    pub fn reduce(agg: Aggregate) -> Self {
        Self {
            agg: Some(agg),
            ..Self::bare(Opcode::Reduce)
        }
    }
    pub fn drop() -> Self {
        Self::bare(Opcode::Drop)
    }
}

/// Static descriptor for one opcode: its display name and its parameter
/// mask. Grounded on the original's `static struct syntax syntax[]` table in
/// `vm.c`, translated from a runtime array of C function pointers to a const
/// Rust array indexed by `Opcode as usize` — the interpreter's `call()`
/// dispatches on `opcode` directly rather than through a stored fn pointer,
/// since match arms are the idiomatic replacement for a jump table here.
pub struct OpDescriptor {
    pub name: &'static str,
    pub mask: ParamMask,
}

pub const OPERATORS: [OpDescriptor; 22] = [
    OpDescriptor { name: "END", mask: ParamMask::empty() },
    OpDescriptor { name: "READ", mask: ParamMask::empty() },
    OpDescriptor { name: "WRITE_ZERO", mask: ParamMask::empty() },
    OpDescriptor { name: "WRITE_ONE", mask: ParamMask::empty() },
    OpDescriptor { name: "WRITE_RAND", mask: ParamMask::empty() },
    OpDescriptor { name: "ERASE", mask: ParamMask::empty() },
    OpDescriptor { name: "LENGTH", mask: ParamMask::empty() },
    OpDescriptor { name: "OFFSET", mask: ParamMask::empty() },
    OpDescriptor { name: "PRINT", mask: ParamMask::STRING },
    OpDescriptor { name: "NEWLINE", mask: ParamMask::empty() },
    OpDescriptor { name: "FORMAT", mask: ParamMask::empty() },
    OpDescriptor { name: "PRINTF", mask: ParamMask::empty() },
    OpDescriptor { name: "BPS", mask: ParamMask::empty() },
    OpDescriptor { name: "SEQUENCE", mask: ParamMask::NUM },
    OpDescriptor { name: "REPEAT", mask: ParamMask::NUM },
    OpDescriptor { name: "OFF_FIXED", mask: ParamMask::VAL },
    OpDescriptor { name: "OFF_LIN", mask: ParamMask::NUM.union(ParamMask::VAL) },
    OpDescriptor { name: "OFF_RAND", mask: ParamMask::NUM.union(ParamMask::VAL) },
    OpDescriptor { name: "LEN_POW2", mask: ParamMask::NUM.union(ParamMask::VAL) },
    OpDescriptor { name: "LEN_FIXED", mask: ParamMask::VAL },
    OpDescriptor { name: "REDUCE", mask: ParamMask::AGG },
    OpDescriptor { name: "DROP", mask: ParamMask::empty() },
];

pub fn descriptor(opcode: Opcode) -> &'static OpDescriptor {
    &OPERATORS[opcode as usize]
}

/// Check `op`'s non-default parameters against its descriptor's mask
/// exactly: every declared slot must be present, every undeclared slot
/// must be absent (spec §4.4 "Invariant (validation)").
pub fn check_arity(op: &OpNode) -> bool {
    let mask = descriptor(op.opcode).mask;
    (op.num.is_some() == mask.contains(ParamMask::NUM))
        && (op.val.is_some() == mask.contains(ParamMask::VAL))
        && (op.string.is_some() == mask.contains(ParamMask::STRING))
        && (op.agg.is_some() == mask.contains(ParamMask::AGG))
}
