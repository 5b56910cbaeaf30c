//! Schema descriptors: the wire-type enum and the immutable field
//! mappings shared by every instance of a message type.

pub mod field_type;
pub mod mapping;
