use thiserror::Error;

/// Failure modes surfaced by the device I/O layer and the interpreter core.
///
/// All variants are fatal within `execute`: a handler that returns `Err`
/// unwinds every enclosing handler, and the driver is expected to print the
/// opcode-name frame trace and exit non-zero.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request of {0} bytes exceeds the {1}-byte buffer limit")]
    TooBig(usize, usize),
    #[error("operator {0:?} called with a parameter set that doesn't match its mask")]
    BadArity(crate::op::Opcode),
    #[error("unknown opcode")]
    UnknownOp,
    #[error("aggregation mixed result kinds")]
    TypeMismatch,
    #[error("aggregated children have incompatible shapes")]
    ShapeMismatch,
    #[error("value cannot be formatted (not Ns, Bytes, or Bps)")]
    Unformattable,
    #[error("OFF_LIN(val=-1) requires max >= len > 0")]
    EmptyRange,
    #[error("allocation failure")]
    AllocFailure,
    #[error("SEQUENCE body not terminated by END")]
    SyntaxError,
    #[error("internal interpreter error: {0}")]
    Internal(&'static str),
}
