// Property suites: marshal/unmarshal equivalence over generated
// messages, pack/unpack identity over generated word streams, and the
// bit-primitive algebra.

use std::sync::Arc;

use claw::{bits, pack, unpack, ChildMapping, ClawStruct, FieldDescr, FieldType, Mapping};
use proptest::prelude::*;

fn leaf() -> Arc<Mapping> {
    Mapping::new(
        "PropLeaf",
        vec![
            FieldDescr::new("id", FieldType::Uint32, 0),
            FieldDescr::new("note", FieldType::String, 1),
        ],
    )
    .unwrap()
}

fn prop_mapping(child: &Arc<Mapping>) -> Arc<Mapping> {
    Mapping::new(
        "Prop",
        vec![
            FieldDescr::new("flag", FieldType::Bool, 0),
            FieldDescr::new("i8", FieldType::Int8, 1),
            FieldDescr::new("i32", FieldType::Int32, 2),
            FieldDescr::new("u64", FieldType::Uint64, 3),
            FieldDescr::new("f32", FieldType::Float32, 4),
            FieldDescr::new("f64", FieldType::Float64, 5),
            FieldDescr::new("name", FieldType::String, 6),
            FieldDescr::new("blob", FieldType::Bytes, 7),
            FieldDescr::new_struct("child", FieldType::Struct, 8, ChildMapping::Mapping(Arc::clone(child))),
            FieldDescr::new("bools", FieldType::ListBools, 9),
            FieldDescr::new("nums", FieldType::ListInt32, 10),
            FieldDescr::new("tags", FieldType::ListStrings, 11),
            FieldDescr::new_struct("items", FieldType::ListStructs, 12, ChildMapping::Mapping(Arc::clone(child))),
        ],
    )
    .unwrap()
}

/// One generated mutation against the message under test.
#[derive(Debug, Clone)]
enum Op {
    Flag(bool),
    I8(i8),
    I32(i32),
    U64(u64),
    F32(f32),
    F64(f64),
    Name(String),
    Blob(Vec<u8>),
    Child(u32, String),
    Bools(Vec<bool>),
    Nums(Vec<i32>),
    Tags(Vec<String>),
    Item(u32, String),
    Delete(u16),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Flag),
        any::<i8>().prop_map(Op::I8),
        any::<i32>().prop_map(Op::I32),
        any::<u64>().prop_map(Op::U64),
        any::<f32>().prop_map(Op::F32),
        any::<f64>().prop_map(Op::F64),
        "[a-z]{1,12}".prop_map(Op::Name),
        proptest::collection::vec(any::<u8>(), 1..40).prop_map(Op::Blob),
        (any::<u32>(), "[a-z]{1,8}").prop_map(|(a, b)| Op::Child(a, b)),
        proptest::collection::vec(any::<bool>(), 1..130).prop_map(Op::Bools),
        proptest::collection::vec(any::<i32>(), 1..20).prop_map(Op::Nums),
        proptest::collection::vec("[a-z]{0,6}".prop_map(String::from), 1..6).prop_map(Op::Tags),
        (any::<u32>(), "[a-z]{1,8}").prop_map(|(a, b)| Op::Item(a, b)),
        (0u16..13).prop_map(Op::Delete),
    ]
}

fn apply(msg: &mut ClawStruct, child_map: &Arc<Mapping>, op: &Op) {
    match op {
        Op::Flag(v) => msg.set_bool(0, *v).unwrap(),
        Op::I8(v) => msg.set_number::<i8>(1, *v).unwrap(),
        Op::I32(v) => msg.set_number::<i32>(2, *v).unwrap(),
        Op::U64(v) => msg.set_number::<u64>(3, *v).unwrap(),
        Op::F32(v) => msg.set_number::<f32>(4, *v).unwrap(),
        Op::F64(v) => msg.set_number::<f64>(5, *v).unwrap(),
        Op::Name(v) => msg.set_string(6, v).unwrap(),
        Op::Blob(v) => msg.set_bytes(7, v).unwrap(),
        Op::Child(id, note) => {
            let mut c = ClawStruct::new(Arc::clone(child_map));
            c.set_number::<u32>(0, *id).unwrap();
            if !note.is_empty() {
                c.set_string(1, note).unwrap();
            }
            msg.set_struct(8, c).unwrap();
        }
        Op::Bools(vs) => msg.bools_mut(9).unwrap().extend(vs.iter().copied()).unwrap(),
        Op::Nums(vs) => msg.numbers_mut::<i32>(10).unwrap().extend(vs.iter().copied()).unwrap(),
        Op::Tags(vs) => {
            let tags = msg.strings_mut(11).unwrap();
            for v in vs {
                tags.append(v).unwrap();
            }
        }
        Op::Item(id, note) => {
            let mut e = ClawStruct::new(Arc::clone(child_map));
            e.set_number::<u32>(0, *id).unwrap();
            if !note.is_empty() {
                e.set_string(1, note).unwrap();
            }
            msg.structs_mut(12).unwrap().append(e).unwrap();
        }
        Op::Delete(f) => msg.delete(*f).unwrap(),
    }
}

proptest! {
    /// unmarshal(marshal(m)) is field-by-field equal to m, and the
    /// running total always matches the bytes produced.
    #[test]
    fn message_roundtrip(ops in proptest::collection::vec(op_strategy(), 0..24)) {
        let child_map = leaf();
        let map = prop_mapping(&child_map);
        let mut msg = ClawStruct::new(Arc::clone(&map));
        for op in &ops {
            apply(&mut msg, &child_map, op);
            prop_assert_eq!(msg.total() % 8, 0);
            prop_assert_eq!(msg.header().final_40(), msg.total());
        }

        let wire = msg.marshal_to_vec().unwrap();
        prop_assert_eq!(wire.len() as u64, msg.total());

        let back = ClawStruct::from_bytes(&map, &wire).unwrap();
        prop_assert!(back == msg, "decoded message differs: {:?} vs {:?}", back, msg);

        // The decoded copy re-encodes to the same bytes via the raw
        // shortcut, and to equivalent bytes after it is disarmed.
        prop_assert_eq!(back.marshal_to_vec().unwrap(), wire.clone());
        let mut touched = ClawStruct::from_bytes(&map, &wire).unwrap();
        touched.set_bool(0, touched.get_bool(0).unwrap()).unwrap();
        let rewire = touched.marshal_to_vec().unwrap();
        let again = ClawStruct::from_bytes(&map, &rewire).unwrap();
        prop_assert!(again == msg);
    }

    /// Packer round-trip is byte-exact over word streams of every
    /// density, including long zero runs and dense literals.
    #[test]
    fn pack_roundtrip(words in proptest::collection::vec(
        prop_oneof![
            3 => Just([0u8; 8]),
            2 => any::<[u8; 8]>(),
            2 => any::<(u8, u8)>().prop_map(|(pos, val)| {
                let mut w = [0u8; 8];
                w[(pos % 8) as usize] = val;
                w
            }),
        ],
        0..300,
    )) {
        let src: Vec<u8> = words.iter().flatten().copied().collect();
        let packed = pack(&src).unwrap();
        prop_assert_eq!(unpack(&packed).unwrap(), src);
    }

    /// set_value then get_bits recovers the value whenever it fits.
    #[test]
    fn bit_field_roundtrip(store in any::<u64>(), lo in 0u32..64, width in 1u32..=64, val in any::<u64>()) {
        let hi = (lo + width).min(64);
        let val = if hi - lo == 64 { val } else { val & ((1u64 << (hi - lo)) - 1) };
        let merged = bits::set_value(val, store, lo, hi);
        prop_assert_eq!(bits::get_bits(merged, bits::mask(lo, hi), lo), val);
        // Bits outside the range are untouched.
        let outside = !bits::mask(lo, hi);
        prop_assert_eq!(merged & outside, store & outside);
    }

    /// Header accessors never bleed into each other's bit ranges.
    #[test]
    fn header_fields_are_independent(num in any::<u16>(), ft in 0u8..=54, f40 in 0u64..(1u64 << 40)) {
        use claw::GenericHeader;
        let Some(field_type) = FieldType::from_u8(ft) else {
            return Ok(());
        };
        let mut h = GenericHeader::new(num, field_type);
        h.set_final_40(f40).unwrap();
        prop_assert_eq!(h.field_num(), num);
        prop_assert_eq!(h.field_type(), ft);
        prop_assert_eq!(h.final_40(), f40);
    }
}
