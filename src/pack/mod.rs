//! Run-length codec for sparse 8-byte words.
//!
//! Claw messages are header-dense: every field starts with an 8-byte
//! header that is usually mostly zero bytes. This codec compresses such
//! streams word-at-a-time. Container layout:
//!
//! ```text
//! u64 LE  unpacked_size
//! u64 LE  packed_size
//! [packed_size bytes of tagged runs]
//! ```
//!
//! Three tag forms:
//!
//! * `0x00` + u16 LE count — that many all-zero words, no payload.
//! * `0xFF` + u16 LE count — that many literal words, `8·count` raw bytes.
//! * `0x01..=0xFE` — one word; the tag is a bitmap (bit i set ⇒ byte i
//!   non-zero) followed by popcount(tag) literal bytes.
//!
//! An all-zero word always uses the run form and a word with all eight
//! bytes non-zero always uses the literal-run form, so an emitted bitmap
//! can never collide with the two reserved tags.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::wire::endian::{read_u16, read_u64, write_u16, write_u64};
use crate::wire::padding::{is_aligned, WORD_SIZE, ZERO_WORD};

/// Fixed container header size.
pub const PACK_HEADER_SIZE: usize = 16;

const TAG_ZERO_RUN: u8 = 0x00;
const TAG_LITERAL_RUN: u8 = 0xFF;
/// Longest run either run form can express.
const MAX_RUN: usize = u16::MAX as usize;

/// Bit i set ⇔ byte i of the word is non-zero.
fn bitmap(word: &[u8]) -> u8 {
    let mut map = 0u8;
    for (i, b) in word.iter().enumerate() {
        if *b != 0 {
            map |= 1 << i;
        }
    }
    map
}

/// Packs a word stream. Input length must be a multiple of 8.
pub fn pack(src: &[u8]) -> Result<Vec<u8>> {
    if !is_aligned(src.len()) {
        return Err(Error::Malformed(format!(
            "pack input of {} bytes is not a multiple of 8",
            src.len()
        )));
    }
    let words: Vec<&[u8]> = src.chunks_exact(WORD_SIZE).collect();
    let mut payload = Vec::new();
    let mut i = 0;

    while i < words.len() {
        let map = bitmap(words[i]);
        if map == 0x00 {
            // Coalesce adjacent zero words.
            let mut run = 1;
            while run < MAX_RUN && i + run < words.len() && bitmap(words[i + run]) == 0x00 {
                run += 1;
            }
            payload.push(TAG_ZERO_RUN);
            push_u16(&mut payload, run as u16);
            i += run;
        } else if map == 0xFF {
            // Coalesce adjacent fully-populated words.
            let mut run = 1;
            while run < MAX_RUN && i + run < words.len() && bitmap(words[i + run]) == 0xFF {
                run += 1;
            }
            payload.push(TAG_LITERAL_RUN);
            push_u16(&mut payload, run as u16);
            for w in &words[i..i + run] {
                payload.extend_from_slice(w);
            }
            i += run;
        } else {
            // Sparse word: bitmap tag plus its non-zero bytes.
            payload.push(map);
            for b in words[i] {
                if *b != 0 {
                    payload.push(*b);
                }
            }
            i += 1;
        }
    }

    let mut out = vec![0u8; PACK_HEADER_SIZE];
    write_u64(&mut out, 0, src.len() as u64);
    write_u64(&mut out, 8, payload.len() as u64);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Unpacks a container produced by [`pack`]. Byte-exact inverse.
pub fn unpack(src: &[u8]) -> Result<Vec<u8>> {
    if src.len() < PACK_HEADER_SIZE {
        return Err(Error::malformed("pack container truncated"));
    }
    let unpacked = read_u64(src, 0);
    let packed = read_u64(src, 8);
    if !is_aligned(unpacked as usize) {
        return Err(Error::Malformed(format!(
            "unpacked size {unpacked} is not a multiple of 8"
        )));
    }
    if packed != (src.len() - PACK_HEADER_SIZE) as u64 {
        return Err(Error::Malformed(format!(
            "packed size {packed} disagrees with {} payload bytes",
            src.len() - PACK_HEADER_SIZE
        )));
    }
    let payload = &src[PACK_HEADER_SIZE..];
    let unpacked = unpacked as usize;

    // Reserve from the declared size, but never trust it for a large
    // up-front allocation; the run walk re-validates as it goes.
    let mut out = Vec::with_capacity(unpacked.min(1 << 20));
    let mut o = 0usize;
    while o < payload.len() {
        let tag = payload[o];
        o += 1;
        match tag {
            TAG_ZERO_RUN => {
                let run = take_run(payload, &mut o)?;
                for _ in 0..run {
                    out.extend_from_slice(&ZERO_WORD);
                }
            }
            TAG_LITERAL_RUN => {
                let run = take_run(payload, &mut o)?;
                let bytes = run * WORD_SIZE;
                if payload.len() - o < bytes {
                    return Err(Error::malformed("literal run truncated"));
                }
                out.extend_from_slice(&payload[o..o + bytes]);
                o += bytes;
            }
            map => {
                let n = map.count_ones() as usize;
                if payload.len() - o < n {
                    return Err(Error::malformed("bitmap word truncated"));
                }
                let mut word = ZERO_WORD;
                for (i, slot) in word.iter_mut().enumerate() {
                    if map >> i & 1 == 1 {
                        *slot = payload[o];
                        o += 1;
                    }
                }
                out.extend_from_slice(&word);
            }
        }
        if out.len() > unpacked {
            return Err(Error::malformed("packed runs overrun the declared size"));
        }
    }
    if out.len() != unpacked {
        return Err(Error::Malformed(format!(
            "packed runs produced {} of {unpacked} declared bytes",
            out.len()
        )));
    }
    Ok(out)
}

/// Packs `src` and writes the container to a sink; returns bytes written.
pub fn pack_to<W: Write + ?Sized>(src: &[u8], w: &mut W) -> Result<usize> {
    let out = pack(src)?;
    w.write_all(&out)?;
    Ok(out.len())
}

/// Reads one container from a source and unpacks it.
pub fn unpack_from<R: Read + ?Sized>(r: &mut R) -> Result<Vec<u8>> {
    let mut head = [0u8; PACK_HEADER_SIZE];
    r.read_exact(&mut head).map_err(eof_as_malformed)?;
    let packed = read_u64(&head, 8) as usize;
    let mut container = vec![0u8; PACK_HEADER_SIZE + packed];
    container[..PACK_HEADER_SIZE].copy_from_slice(&head);
    r.read_exact(&mut container[PACK_HEADER_SIZE..])
        .map_err(eof_as_malformed)?;
    unpack(&container)
}

fn eof_as_malformed(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::malformed("pack container truncated"),
        _ => Error::Io(e),
    }
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    let at = out.len();
    out.extend_from_slice(&[0, 0]);
    write_u16(out, at, v);
}

fn take_run(payload: &[u8], o: &mut usize) -> Result<usize> {
    if payload.len() - *o < 2 {
        return Err(Error::malformed("run count truncated"));
    }
    let run = read_u16(payload, *o) as usize;
    *o += 2;
    if run == 0 {
        return Err(Error::malformed("run with zero count"));
    }
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(src: &[u8]) {
        let packed = pack(src).unwrap();
        assert_eq!(unpack(&packed).unwrap(), src);
    }

    #[test]
    fn empty_input() {
        let packed = pack(&[]).unwrap();
        assert_eq!(packed.len(), PACK_HEADER_SIZE);
        assert_eq!(unpack(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn unaligned_input_rejected() {
        assert!(matches!(pack(&[0u8; 7]), Err(Error::Malformed(_))));
        assert!(matches!(pack(&[0u8; 12]), Err(Error::Malformed(_))));
    }

    #[test]
    fn zero_words_collapse_to_one_run() {
        let src = vec![0u8; 8 * 1000];
        let packed = pack(&src).unwrap();
        // One zero-run tag: 16-byte header + tag + u16 count.
        assert_eq!(packed.len(), PACK_HEADER_SIZE + 3);
        assert_eq!(unpack(&packed).unwrap(), src);
    }

    #[test]
    fn dense_words_become_one_literal_run() {
        let src: Vec<u8> = (0..32).map(|i| i as u8 + 1).collect();
        let packed = pack(&src).unwrap();
        // header + tag + count + 32 raw bytes
        assert_eq!(packed.len(), PACK_HEADER_SIZE + 3 + 32);
        assert_eq!(unpack(&packed).unwrap(), src);
    }

    #[test]
    fn sparse_word_uses_bitmap() {
        // Word with bytes 0 and 3 set: bitmap 0b0000_1001.
        let src = [0xAAu8, 0, 0, 0xBB, 0, 0, 0, 0];
        let packed = pack(&src).unwrap();
        assert_eq!(&packed[PACK_HEADER_SIZE..], &[0b0000_1001, 0xAA, 0xBB]);
        assert_eq!(unpack(&packed).unwrap(), src);
    }

    #[test]
    fn bitmap_never_collides_with_reserved_tags() {
        // Seven non-zero bytes: stays a bitmap of 0x7F or 0xFE, never 0xFF.
        let low_seven = [1u8, 2, 3, 4, 5, 6, 7, 0];
        let packed = pack(&low_seven).unwrap();
        assert_eq!(packed[PACK_HEADER_SIZE], 0x7F);

        let high_seven = [0u8, 2, 3, 4, 5, 6, 7, 8];
        let packed = pack(&high_seven).unwrap();
        assert_eq!(packed[PACK_HEADER_SIZE], 0xFE);

        // Eight non-zero bytes: literal run, tag 0xFF.
        let full = [9u8; 8];
        let packed = pack(&full).unwrap();
        assert_eq!(packed[PACK_HEADER_SIZE], TAG_LITERAL_RUN);
    }

    #[test]
    fn mixed_stream_roundtrips() {
        let mut src = Vec::new();
        src.extend_from_slice(&[0u8; 24]); // zero run
        src.extend_from_slice(&[1, 0, 0, 0, 2, 0, 0, 3]); // bitmap word
        src.extend_from_slice(&[7u8; 16]); // literal run
        src.extend_from_slice(&[0u8; 8]); // zero run
        roundtrip(&src);
    }

    #[test]
    fn runs_split_at_u16_max() {
        let words = MAX_RUN + 10;
        let src = vec![0u8; words * 8];
        let packed = pack(&src).unwrap();
        // Two zero-run records.
        assert_eq!(packed.len(), PACK_HEADER_SIZE + 6);
        assert_eq!(unpack(&packed).unwrap(), src);
    }

    #[test]
    fn unpack_rejects_corrupt_containers() {
        assert!(unpack(&[0u8; 10]).is_err());

        // Declared packed size disagreeing with payload.
        let mut c = pack(&[0u8; 8]).unwrap();
        c.push(0);
        assert!(matches!(unpack(&c), Err(Error::Malformed(_))));

        // Zero-count run.
        let mut c = vec![0u8; PACK_HEADER_SIZE];
        write_u64(&mut c, 0, 8);
        write_u64(&mut c, 8, 3);
        c.extend_from_slice(&[TAG_ZERO_RUN, 0, 0]);
        assert!(matches!(unpack(&c), Err(Error::Malformed(_))));

        // Runs overrunning the declared size.
        let mut c = vec![0u8; PACK_HEADER_SIZE];
        write_u64(&mut c, 0, 8);
        write_u64(&mut c, 8, 3);
        c.extend_from_slice(&[TAG_ZERO_RUN, 2, 0]);
        assert!(matches!(unpack(&c), Err(Error::Malformed(_))));

        // Truncated literal run.
        let mut c = vec![0u8; PACK_HEADER_SIZE];
        write_u64(&mut c, 0, 16);
        write_u64(&mut c, 8, 3 + 8);
        c.extend_from_slice(&[TAG_LITERAL_RUN, 2, 0]);
        c.extend_from_slice(&[1u8; 8]);
        assert!(matches!(unpack(&c), Err(Error::Malformed(_))));
    }

    #[test]
    fn stream_forms_match_slice_forms() {
        let src = [5u8, 0, 0, 0, 0, 0, 0, 5];
        let mut sink = Vec::new();
        let n = pack_to(&src, &mut sink).unwrap();
        assert_eq!(n, sink.len());
        let mut cursor: &[u8] = &sink;
        assert_eq!(unpack_from(&mut cursor).unwrap(), src);
    }
}
