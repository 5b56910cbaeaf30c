// List container behavior through full encode/decode cycles.

use std::sync::Arc;

use claw::{
    Bools, Bytes, ChildMapping, ClawStruct, Error, FieldDescr, FieldType, Mapping, Numbers,
    Strings, Structs,
};

fn item() -> Arc<Mapping> {
    Mapping::new(
        "Item",
        vec![
            FieldDescr::new("id", FieldType::Uint32, 0),
            FieldDescr::new("label", FieldType::String, 1),
        ],
    )
    .unwrap()
}

fn mapping(child: &Arc<Mapping>) -> Arc<Mapping> {
    Mapping::new(
        "Lists",
        vec![
            FieldDescr::new("flags", FieldType::ListBools, 0),
            FieldDescr::new("i16s", FieldType::ListInt16, 1),
            FieldDescr::new("f64s", FieldType::ListFloat64, 2),
            FieldDescr::new("blobs", FieldType::ListBytes, 3),
            FieldDescr::new("tags", FieldType::ListStrings, 4),
            FieldDescr::new_struct("items", FieldType::ListStructs, 5, ChildMapping::Mapping(Arc::clone(child))),
        ],
    )
    .unwrap()
}

#[test]
fn bool_list_roundtrip_across_word_boundary() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(Arc::clone(&map));
    let values: Vec<bool> = (0..70).map(|i| i % 3 == 0).collect();
    m.bools_mut(0).unwrap().extend(values.iter().copied()).unwrap();
    // 70 bools need two 8-byte words.
    assert_eq!(m.total(), 8 + 8 + 16);

    let wire = m.marshal_to_vec().unwrap();
    let back = ClawStruct::from_bytes(&map, &wire).unwrap();
    assert_eq!(back.bools(0).unwrap().unwrap().slice(), values);
    assert_eq!(back, m);
}

#[test]
fn number_list_roundtrip_preserves_values_and_padding() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(Arc::clone(&map));
    m.numbers_mut::<i16>(1).unwrap().extend([-1, 0, 32767, -32768, 5]).unwrap();
    m.numbers_mut::<f64>(2).unwrap().extend([0.5, -0.5, f64::MAX]).unwrap();
    // 5 i16 = 10 bytes -> 16 padded; 3 f64 = 24 bytes.
    assert_eq!(m.total(), 8 + (8 + 16) + (8 + 24));

    let wire = m.marshal_to_vec().unwrap();
    let back = ClawStruct::from_bytes(&map, &wire).unwrap();
    assert_eq!(back.numbers::<i16>(1).unwrap().unwrap().slice(), vec![-1, 0, 32767, -32768, 5]);
    assert_eq!(back.numbers::<f64>(2).unwrap().unwrap().slice(), vec![0.5, -0.5, f64::MAX]);
    assert_eq!(back, m);
}

#[test]
fn typed_list_access_is_checked() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(map);
    m.numbers_mut::<i16>(1).unwrap().append(1).unwrap();
    // Same slot read with the wrong element type is refused.
    assert!(matches!(m.numbers::<u16>(1), Err(Error::TypeMismatch(_))));
    assert!(matches!(m.numbers_mut::<i32>(1), Err(Error::TypeMismatch(_))));
}

#[test]
fn bytes_list_entries_roundtrip() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(Arc::clone(&map));
    let entries: Vec<&[u8]> = vec![b"a", b"", b"three", b"\x00\xFF"];
    for e in &entries {
        m.bytes_list_mut(3).unwrap().append(e).unwrap();
    }
    // data = (4+1) + (4+0) + (4+5) + (4+2) = 24, already aligned.
    assert_eq!(m.total(), 8 + 8 + 24);

    let wire = m.marshal_to_vec().unwrap();
    let back = ClawStruct::from_bytes(&map, &wire).unwrap();
    let got = back.bytes_list(3).unwrap().unwrap().slice();
    assert_eq!(got, entries.iter().map(|e| e.to_vec()).collect::<Vec<_>>());
}

#[test]
fn string_list_roundtrip_and_utf8_enforcement() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(Arc::clone(&map));
    m.strings_mut(4).unwrap().extend(["håndtere", "x"]).unwrap();
    let wire = m.marshal_to_vec().unwrap();
    let back = ClawStruct::from_bytes(&map, &wire).unwrap();
    assert_eq!(back.strings(4).unwrap().unwrap().slice(), vec!["håndtere", "x"]);

    // Corrupt the first entry's first byte into invalid UTF-8; decode
    // must refuse. Offset: message header + list header + u32 length.
    let mut bad = wire;
    bad[8 + 8 + 4] = 0xFF;
    assert!(matches!(
        ClawStruct::from_bytes(&map, &bad),
        Err(Error::Malformed(_))
    ));
}

#[test]
fn struct_list_roundtrip_with_stamped_indices() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(Arc::clone(&map));
    for i in 0..3u32 {
        let mut e = ClawStruct::new(Arc::clone(&child));
        e.set_number::<u32>(0, i + 1).unwrap();
        e.set_string(1, &format!("item-{i}")).unwrap();
        m.structs_mut(5).unwrap().append(e).unwrap();
    }

    let wire = m.marshal_to_vec().unwrap();
    let back = ClawStruct::from_bytes(&map, &wire).unwrap();
    let items = back.structs(5).unwrap().unwrap();
    assert_eq!(items.len(), 3);
    for i in 0..3usize {
        let e = items.get(i).unwrap();
        assert_eq!(e.field_num() as usize, i);
        assert_eq!(e.get_number::<u32>(0).unwrap() as usize, i + 1);
        assert_eq!(e.get_string(1).unwrap().unwrap(), format!("item-{i}"));
    }
    assert_eq!(back, m);
}

#[test]
fn empty_lists_are_absent_from_the_wire() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(Arc::clone(&map));
    // Touch every list without appending.
    m.bools_mut(0).unwrap();
    m.numbers_mut::<i16>(1).unwrap();
    m.bytes_list_mut(3).unwrap();
    m.strings_mut(4).unwrap();
    m.structs_mut(5).unwrap();
    assert_eq!(m.total(), 8);
    assert_eq!(m.marshal_to_vec().unwrap().len(), 8);
}

#[test]
fn standalone_lists_attach_once() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(Arc::clone(&map));

    let mut flags = Bools::new();
    flags.extend([true, false]).unwrap();
    m.set_bools(0, flags).unwrap();
    assert_eq!(m.bools(0).unwrap().unwrap().slice(), vec![true, false]);

    let mut nums = Numbers::<i16>::new();
    nums.append(-9).unwrap();
    m.set_numbers(1, nums).unwrap();

    let mut blobs = Bytes::new();
    blobs.append(b"raw").unwrap();
    m.set_bytes_list(3, blobs).unwrap();

    let mut tags = Strings::new();
    tags.append("tag").unwrap();
    m.set_strings(4, tags).unwrap();

    let mut items = Structs::new(Arc::clone(&child));
    let mut e = ClawStruct::new(Arc::clone(&child));
    e.set_number::<u32>(0, 42).unwrap();
    items.append(e).unwrap();
    m.set_structs(5, items).unwrap();

    let wire = m.marshal_to_vec().unwrap();
    let back = ClawStruct::from_bytes(&map, &wire).unwrap();
    assert_eq!(back, m);
}

#[test]
fn replacing_a_list_subtracts_the_old_one() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(Arc::clone(&map));
    m.numbers_mut::<i16>(1).unwrap().extend([1, 2, 3, 4]).unwrap();
    assert_eq!(m.total(), 8 + 8 + 8);

    let mut replacement = Numbers::<i16>::new();
    replacement.append(9).unwrap();
    m.set_numbers(1, replacement).unwrap();
    assert_eq!(m.total(), 8 + 8 + 8);
    assert_eq!(m.numbers::<i16>(1).unwrap().unwrap().slice(), vec![9]);
}

#[test]
fn list_iterators_are_lazy_and_bounded() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(map);
    m.numbers_mut::<i16>(1).unwrap().extend([10, 20, 30, 40, 50]).unwrap();
    let list = m.numbers::<i16>(1).unwrap().unwrap();

    let mut it = list.range(1, 4).unwrap();
    assert_eq!(it.next(), Some(20));
    assert_eq!(it.next(), Some(30));
    assert_eq!(it.next(), Some(40));
    assert_eq!(it.next(), None);
    // Exhausted stays exhausted.
    assert_eq!(it.next(), None);

    assert!(matches!(
        list.range(0, 6),
        Err(Error::OutOfBounds { index: 6, len: 5 })
    ));
}

#[test]
fn deep_list_mutation_keeps_every_ancestor_total() {
    let child = item();
    let map = mapping(&child);
    let mut m = ClawStruct::new(Arc::clone(&map));
    let mut e = ClawStruct::new(Arc::clone(&child));
    e.set_number::<u32>(0, 1).unwrap();
    m.structs_mut(5).unwrap().append(e).unwrap();
    let before = m.total();

    // Grow a string deep inside the element; the delta is exact at
    // every level.
    m.structs_mut(5)
        .unwrap()
        .get_mut(0)
        .unwrap()
        .set_string(1, "12345678")
        .unwrap();
    assert_eq!(m.total(), before + 16);
    assert_eq!(m.header().final_40(), m.total());
    let elem_total = m.structs(5).unwrap().unwrap().get(0).unwrap().total();
    assert_eq!(elem_total, 8 + 8 + 16);
}
