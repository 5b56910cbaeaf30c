// Header-packer behavior over realistic message encodings and crafted
// word streams.

use std::sync::Arc;

use claw::{
    pack, pack_to, unpack, unpack_from, ChildMapping, ClawStruct, Error, FieldDescr, FieldType,
    Mapping, PACK_HEADER_SIZE,
};

fn mapping() -> Arc<Mapping> {
    let leaf = Mapping::new("PkLeaf", vec![FieldDescr::new("on", FieldType::Bool, 0)]).unwrap();
    Mapping::new(
        "Pk",
        vec![
            FieldDescr::new("a", FieldType::Bool, 0),
            FieldDescr::new("b", FieldType::Uint32, 1),
            FieldDescr::new("c", FieldType::Uint64, 2),
            FieldDescr::new("d", FieldType::String, 3),
            FieldDescr::new_struct("e", FieldType::Struct, 4, ChildMapping::Mapping(leaf)),
        ],
    )
    .unwrap()
}

/// A marshalled message is a legal packer input (always 8-aligned) and
/// compresses: headers are mostly zero bytes.
#[test]
fn message_encodings_shrink() {
    let map = mapping();
    let mut m = ClawStruct::new(Arc::clone(&map));
    m.set_bool(0, true).unwrap();
    m.set_number::<u32>(1, 7).unwrap();
    m.set_number::<u64>(2, 1).unwrap();
    m.set_string(3, "abc").unwrap();
    let wire = m.marshal_to_vec().unwrap();
    assert_eq!(wire.len() % 8, 0);

    let packed = pack(&wire).unwrap();
    assert!(packed.len() < wire.len() + PACK_HEADER_SIZE);
    assert_eq!(unpack(&packed).unwrap(), wire);
}

/// Best-case ratio: all-zero input approaches 3 bytes per run of up to
/// 65 535 words, plus the fixed 16-byte frame.
#[test]
fn all_zero_ratio() {
    let src = vec![0u8; 65_535 * 8];
    let packed = pack(&src).unwrap();
    assert_eq!(packed.len(), PACK_HEADER_SIZE + 3);
}

/// Worst-case overhead for incompressible input: ≈3 bytes per run plus
/// the 16-byte frame.
#[test]
fn dense_input_overhead_is_bounded() {
    let src: Vec<u8> = (0..4096u32).map(|i| (i % 255) as u8 + 1).collect();
    let packed = pack(&src).unwrap();
    assert!(packed.len() <= src.len() + PACK_HEADER_SIZE + 3);
    assert_eq!(unpack(&packed).unwrap(), src);
}

/// Containers read back from a stream one at a time, leaving trailing
/// data in the source.
#[test]
fn containers_concatenate_on_a_stream() {
    let first = [1u8, 0, 0, 0, 0, 0, 0, 0];
    let second = vec![0u8; 16];
    let mut stream = Vec::new();
    pack_to(&first, &mut stream).unwrap();
    pack_to(&second, &mut stream).unwrap();

    let mut cursor: &[u8] = &stream;
    assert_eq!(unpack_from(&mut cursor).unwrap(), first);
    assert_eq!(unpack_from(&mut cursor).unwrap(), second);
    assert!(cursor.is_empty());
}

#[test]
fn truncated_stream_is_malformed() {
    let packed = pack(&[7u8; 8]).unwrap();
    let mut cursor: &[u8] = &packed[..packed.len() - 1];
    assert!(matches!(unpack_from(&mut cursor), Err(Error::Malformed(_))));
}

/// Seeded random streams of mixed density round-trip byte-exact.
#[test]
fn seeded_random_streams_roundtrip() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0xC1A_u64);
    for _ in 0..50 {
        let words = rng.gen_range(0..200);
        let mut src = Vec::with_capacity(words * 8);
        for _ in 0..words {
            let mut w = [0u8; 8];
            match rng.gen_range(0..3) {
                0 => {}
                1 => rng.fill(&mut w[..]),
                _ => w[rng.gen_range(0..8)] = rng.gen_range(1..=255),
            }
            src.extend_from_slice(&w);
        }
        let packed = pack(&src).unwrap();
        assert_eq!(unpack(&packed).unwrap(), src, "failed for {words} words");
    }
}

/// Words alternating between empty and dense exercise every tag form in
/// one stream.
#[test]
fn alternating_density_roundtrip() {
    let mut src = Vec::new();
    for i in 0..64u8 {
        match i % 4 {
            0 => src.extend_from_slice(&[0u8; 8]),
            1 => src.extend_from_slice(&[i; 8]),
            2 => {
                let mut w = [0u8; 8];
                w[(i % 8) as usize] = i;
                src.extend_from_slice(&w);
            }
            _ => src.extend_from_slice(&[0u8; 8]),
        }
    }
    let packed = pack(&src).unwrap();
    assert_eq!(unpack(&packed).unwrap(), src);
    assert!(packed.len() < src.len());
}
