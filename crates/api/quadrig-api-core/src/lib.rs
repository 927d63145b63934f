//! quadrig-api-core: shared value, channel and path API (engine-agnostic).
//!
//! These types sit on the boundary between the corrective engine and
//! whatever host consumes its output: plain data, serde round-trippable,
//! no scene or solver logic.

pub mod channel;
pub mod path;
pub mod side;
pub mod value;
pub mod write_ops;

pub use channel::{Axis, Channel, ChannelValues};
pub use path::{PathError, RigPath};
pub use side::Side;
pub use value::{Transform, Value, ValueKind};
pub use write_ops::{WriteBatch, WriteOp};
