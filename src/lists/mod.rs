//! List containers.
//!
//! Every list is a single generic header (final-40 = item count) plus a
//! type-specific payload. A list holds the size-cell chain of its owning
//! message and pushes byte deltas through it on every mutation; a list
//! built standalone has an empty chain until it is attached.
//!
//! Empty lists are never encoded; there is no on-wire distinction between
//! "never set" and "set but empty".

pub mod bools;
pub mod bytes;
pub mod numbers;
pub mod strings;
pub mod structs;

pub use bools::Bools;
pub use bytes::Bytes;
pub use numbers::Numbers;
pub use strings::Strings;
pub use structs::Structs;
