//! Runtime encoder/decoder for the Claw binary serialization format.
//!
//! Every value on the wire is a fixed 64-bit header followed by
//! 8-byte-aligned payload. Messages carry ordered field numbers, pass
//! unknown trailing fields through verbatim, and track their running
//! wire size on every mutation so marshal never re-measures.
//!
//! ```
//! use claw::{ClawStruct, FieldDescr, FieldType, Mapping};
//!
//! let mapping = Mapping::new(
//!     "Sample",
//!     vec![
//!         FieldDescr::new("enabled", FieldType::Bool, 0),
//!         FieldDescr::new("name", FieldType::String, 1),
//!     ],
//! )
//! .unwrap();
//!
//! let mut msg = ClawStruct::new(mapping.clone());
//! msg.set_bool(0, true).unwrap();
//! msg.set_string(1, "hello").unwrap();
//!
//! let wire = msg.marshal_to_vec().unwrap();
//! let back = ClawStruct::from_bytes(&mapping, &wire).unwrap();
//! assert_eq!(back, msg);
//! ```

pub mod bits;
pub mod error;
pub mod lists;
pub mod message;
pub mod number;
pub mod pack;
pub mod schema;
pub mod wire;

mod chain;
mod codec;
mod slot;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level re-exports for the common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Crate-wide error and result types.
pub use error::{Error, Result};

/// The in-memory message and its decode-time field index entries.
pub use message::{ClawStruct, FieldSpan};

/// List containers.
pub use lists::{Bools, Bytes, Numbers, Strings, Structs};

/// The sealed trait covering the ten fixed-width numeric scalars.
pub use number::ClawNumber;

/// Schema descriptors.
pub use schema::field_type::FieldType;
pub use schema::mapping::{ChildMapping, FieldDescr, Mapping};

/// The packed 8-byte header every wire value starts with.
pub use wire::header::{GenericHeader, HEADER_SIZE, MAX_FINAL40};

/// Run-length codec for header-dense word streams.
pub use pack::{pack, pack_to, unpack, unpack_from, PACK_HEADER_SIZE};
