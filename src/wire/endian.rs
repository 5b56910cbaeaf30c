//! Little-endian read/write helpers for byte slices and io streams.
//!
//! Everything on the Claw wire is little-endian. The slice forms take an
//! explicit byte offset and panic on out-of-bounds access (slices handed
//! to them are pre-validated by the decoder's scan phase); the stream
//! forms propagate io errors.

use std::io::{self, Read, Write};

macro_rules! le_codec {
    ($t:ty, $read:ident, $write:ident, $get:ident, $put:ident, $width:expr) => {
        /// Reads a little-endian value from `src` at byte `offset`.
        #[inline]
        pub fn $read(src: &[u8], offset: usize) -> $t {
            let mut raw = [0u8; $width];
            raw.copy_from_slice(&src[offset..offset + $width]);
            <$t>::from_le_bytes(raw)
        }

        /// Writes `value` little-endian into `dst` at byte `offset`.
        #[inline]
        pub fn $write(dst: &mut [u8], offset: usize, value: $t) {
            dst[offset..offset + $width].copy_from_slice(&value.to_le_bytes());
        }

        /// Reads a little-endian value from a byte source.
        #[inline]
        pub fn $get<R: Read + ?Sized>(src: &mut R) -> io::Result<$t> {
            let mut raw = [0u8; $width];
            src.read_exact(&mut raw)?;
            Ok(<$t>::from_le_bytes(raw))
        }

        /// Writes `value` little-endian to a byte sink.
        #[inline]
        pub fn $put<W: Write + ?Sized>(dst: &mut W, value: $t) -> io::Result<()> {
            dst.write_all(&value.to_le_bytes())
        }
    };
}

le_codec!(u8, read_u8, write_u8, get_u8, put_u8, 1);
le_codec!(u16, read_u16, write_u16, get_u16, put_u16, 2);
le_codec!(u32, read_u32, write_u32, get_u32, put_u32, 4);
le_codec!(u64, read_u64, write_u64, get_u64, put_u64, 8);
le_codec!(i8, read_i8, write_i8, get_i8, put_i8, 1);
le_codec!(i16, read_i16, write_i16, get_i16, put_i16, 2);
le_codec!(i32, read_i32, write_i32, get_i32, put_i32, 4);
le_codec!(i64, read_i64, write_i64, get_i64, put_i64, 8);
le_codec!(f32, read_f32, write_f32, get_f32, put_f32, 4);
le_codec!(f64, read_f64, write_f64, get_f64, put_f64, 8);
