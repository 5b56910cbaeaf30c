//! Field-schema descriptors.
//!
//! A [`Mapping`] is the immutable descriptor for one struct type: an
//! ordered list of field descriptors whose numbers equal their positions.
//! Mappings are built once (normally by generated code) and shared by
//! every instance of the type through an `Arc`.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::field_type::FieldType;

/// The mapping a nested struct or list-of-struct field decodes with.
#[derive(Clone)]
pub enum ChildMapping {
    /// Same as the enclosing mapping. Breaks what would otherwise be a
    /// reference cycle for self-referential types.
    SelfRef,
    /// A concrete child type.
    Mapping(Arc<Mapping>),
}

impl ChildMapping {
    /// Resolves the marker against the enclosing mapping.
    pub fn resolve(&self, enclosing: &Arc<Mapping>) -> Arc<Mapping> {
        match self {
            ChildMapping::SelfRef => Arc::clone(enclosing),
            ChildMapping::Mapping(m) => Arc::clone(m),
        }
    }
}

impl fmt::Debug for ChildMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildMapping::SelfRef => f.write_str("SelfRef"),
            ChildMapping::Mapping(m) => write!(f, "Mapping({})", m.name()),
        }
    }
}

/// One field of a struct type.
#[derive(Debug, Clone)]
pub struct FieldDescr {
    name: String,
    field_type: FieldType,
    field_num: u16,
    is_enum: bool,
    child: Option<ChildMapping>,
}

impl FieldDescr {
    /// A scalar or non-struct list field.
    pub fn new(name: impl Into<String>, field_type: FieldType, field_num: u16) -> FieldDescr {
        FieldDescr {
            name: name.into(),
            field_type,
            field_num,
            is_enum: false,
            child: None,
        }
    }

    /// A uint8/uint16 field whose values are a named enum in the schema.
    pub fn new_enum(name: impl Into<String>, field_type: FieldType, field_num: u16) -> FieldDescr {
        FieldDescr {
            is_enum: true,
            ..FieldDescr::new(name, field_type, field_num)
        }
    }

    /// A nested-struct or list-of-struct field.
    pub fn new_struct(
        name: impl Into<String>,
        field_type: FieldType,
        field_num: u16,
        child: ChildMapping,
    ) -> FieldDescr {
        FieldDescr {
            child: Some(child),
            ..FieldDescr::new(name, field_type, field_num)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn field_num(&self) -> u16 {
        self.field_num
    }

    pub fn is_enum(&self) -> bool {
        self.is_enum
    }

    pub fn child(&self) -> Option<&ChildMapping> {
        self.child.as_ref()
    }

    fn needs_child(&self) -> bool {
        matches!(self.field_type, FieldType::Struct | FieldType::ListStructs)
    }

    fn may_be_enum(&self) -> bool {
        matches!(self.field_type, FieldType::Uint8 | FieldType::Uint16)
    }
}

/// The immutable descriptor for one struct type.
pub struct Mapping {
    name: String,
    fields: Vec<FieldDescr>,
}

impl Mapping {
    /// Validates and freezes a mapping.
    ///
    /// Rules: field numbers equal positions, at most `u16::MAX + 1`
    /// fields, no `Unknown` types, the enum flag only on uint8/uint16,
    /// and struct-typed fields carry a child mapping or the self marker
    /// (child mappings were themselves validated at their construction).
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescr>) -> Result<Arc<Mapping>> {
        let name = name.into();
        if fields.len() > u16::MAX as usize + 1 {
            return Err(Error::InvalidArgument(format!(
                "mapping {name}: {} fields exceed the u16 field-number space",
                fields.len()
            )));
        }
        for (idx, f) in fields.iter().enumerate() {
            if f.field_num as usize != idx {
                return Err(Error::InvalidArgument(format!(
                    "mapping {name}: field {} has number {} at position {idx}",
                    f.name, f.field_num
                )));
            }
            if f.field_type == FieldType::Unknown {
                return Err(Error::InvalidArgument(format!(
                    "mapping {name}: field {} has no wire type",
                    f.name
                )));
            }
            if f.is_enum && !f.may_be_enum() {
                return Err(Error::InvalidArgument(format!(
                    "mapping {name}: field {} marked enum but is {:?}",
                    f.name, f.field_type
                )));
            }
            if f.needs_child() != f.child.is_some() {
                return Err(Error::InvalidArgument(format!(
                    "mapping {name}: field {} ({:?}) {} a child mapping",
                    f.name,
                    f.field_type,
                    if f.needs_child() { "requires" } else { "must not carry" }
                )));
            }
        }
        Ok(Arc::new(Mapping { name, fields }))
    }

    /// Schema name of the struct type.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The descriptor for a field number, if it is in range.
    pub fn field(&self, num: u16) -> Option<&FieldDescr> {
        self.fields.get(num as usize)
    }

    /// Looks a field up by schema name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescr> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterates descriptors in field-number order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescr> {
        self.fields.iter()
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf() -> Arc<Mapping> {
        Mapping::new("Leaf", vec![FieldDescr::new("on", FieldType::Bool, 0)]).unwrap()
    }

    #[test]
    fn valid_mapping_builds() {
        let m = Mapping::new(
            "Sample",
            vec![
                FieldDescr::new("flag", FieldType::Bool, 0),
                FieldDescr::new("count", FieldType::Uint32, 1),
                FieldDescr::new_enum("kind", FieldType::Uint8, 2),
                FieldDescr::new_struct("leaf", FieldType::Struct, 3, ChildMapping::Mapping(leaf())),
                FieldDescr::new_struct("next", FieldType::ListStructs, 4, ChildMapping::SelfRef),
            ],
        )
        .unwrap();
        assert_eq!(m.len(), 5);
        assert_eq!(m.field(1).unwrap().name(), "count");
        assert_eq!(m.field_by_name("kind").unwrap().field_num(), 2);
        assert!(m.field(5).is_none());
    }

    #[test]
    fn field_numbers_must_equal_positions() {
        let err = Mapping::new("Bad", vec![FieldDescr::new("a", FieldType::Bool, 1)]);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn enum_flag_restricted_to_small_uints() {
        let err = Mapping::new("Bad", vec![FieldDescr::new_enum("a", FieldType::Int32, 0)]);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
        assert!(Mapping::new("Ok", vec![FieldDescr::new_enum("a", FieldType::Uint16, 0)]).is_ok());
    }

    #[test]
    fn struct_fields_require_children() {
        let err = Mapping::new("Bad", vec![FieldDescr::new("s", FieldType::Struct, 0)]);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));

        let err = Mapping::new(
            "AlsoBad",
            vec![FieldDescr::new_struct("b", FieldType::Bool, 0, ChildMapping::SelfRef)],
        );
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn unknown_type_rejected() {
        let err = Mapping::new("Bad", vec![FieldDescr::new("a", FieldType::Unknown, 0)]);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn self_marker_resolves_to_enclosing() {
        let m = Mapping::new(
            "Node",
            vec![FieldDescr::new_struct("next", FieldType::Struct, 0, ChildMapping::SelfRef)],
        )
        .unwrap();
        let resolved = m.field(0).unwrap().child().unwrap().resolve(&m);
        assert!(Arc::ptr_eq(&resolved, &m));
    }
}
