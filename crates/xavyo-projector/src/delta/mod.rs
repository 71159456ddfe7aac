//! Change primitives: object snapshots, item deltas and object deltas.

mod item_delta;
mod object;
mod object_delta;

pub use item_delta::ItemDelta;
pub use object::{ObjectSnapshot, ObjectType, ShadowCoordinates};
pub use object_delta::{ChangeType, DeltaChange, ObjectDelta};
