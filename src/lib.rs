pub mod device;
pub mod error;
pub mod fixed_shape;
pub mod interp;
pub mod io;
pub mod lfsr;
pub mod op;
pub mod value;

pub use device::{Device, WriteBuf, discard_once};
pub use error::CoreError;
pub use interp::{ExecContext, execute};
pub use op::{Aggregate, OpNode, Opcode};
pub use value::Value;
