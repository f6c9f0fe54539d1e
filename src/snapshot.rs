//! Primitive binary I/O for index snapshots.
//!
//! Scalars are fixed-width in host byte order; sequences are prefixed with
//! a `u64` element count followed by the raw elements. Snapshots are
//! deliberately **not** portable across machines of differing endianness —
//! a mismatched file fails the loader's range checks instead of decoding
//! to garbage.

use std::io::{Read, Write};

use crate::error::{Error, Result};

macro_rules! scalar_io {
    ($write:ident, $read:ident, $ty:ty) => {
        pub(crate) fn $write<W: Write>(w: &mut W, value: $ty) -> Result<()> {
            w.write_all(&value.to_ne_bytes())?;
            Ok(())
        }

        pub(crate) fn $read<R: Read>(r: &mut R) -> Result<$ty> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            r.read_exact(&mut buf)?;
            Ok(<$ty>::from_ne_bytes(buf))
        }
    };
}

scalar_io!(write_u8, read_u8, u8);
scalar_io!(write_i32, read_i32, i32);
scalar_io!(write_i64, read_i64, i64);
scalar_io!(write_u64, read_u64, u64);

pub(crate) fn write_bool<W: Write>(w: &mut W, value: bool) -> Result<()> {
    write_u8(w, u8::from(value))
}

pub(crate) fn read_bool<R: Read>(r: &mut R) -> Result<bool> {
    match read_u8(r)? {
        0 => Ok(false),
        1 => Ok(true),
        v => Err(Error::Format(format!("invalid boolean byte {v}"))),
    }
}

macro_rules! seq_io {
    ($write:ident, $read:ident, $ty:ty) => {
        pub(crate) fn $write<W: Write>(w: &mut W, data: &[$ty]) -> Result<()> {
            write_u64(w, data.len() as u64)?;
            for &x in data {
                w.write_all(&x.to_ne_bytes())?;
            }
            Ok(())
        }

        pub(crate) fn $read<R: Read>(r: &mut R) -> Result<Vec<$ty>> {
            let count = read_u64(r)?;
            // cap the preallocation so a corrupt length can't trigger a
            // huge reservation before the read fails
            let mut data = Vec::with_capacity(count.min(1 << 16) as usize);
            for _ in 0..count {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                r.read_exact(&mut buf)?;
                data.push(<$ty>::from_ne_bytes(buf));
            }
            Ok(data)
        }
    };
}

seq_io!(write_f32_seq, read_f32_seq, f32);
seq_io!(write_i64_seq, read_i64_seq, i64);
seq_io!(write_i8_seq, read_i8_seq, i8);

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn scalars_round_trip() {
        let mut buf = Vec::new();
        write_i32(&mut buf, -7).unwrap();
        write_i64(&mut buf, 1 << 40).unwrap();
        write_u64(&mut buf, 42).unwrap();
        write_bool(&mut buf, true).unwrap();

        let mut r = Cursor::new(buf);
        assert_eq!(read_i32(&mut r).unwrap(), -7);
        assert_eq!(read_i64(&mut r).unwrap(), 1 << 40);
        assert_eq!(read_u64(&mut r).unwrap(), 42);
        assert!(read_bool(&mut r).unwrap());
    }

    #[test]
    fn sequences_round_trip() {
        let mut buf = Vec::new();
        write_f32_seq(&mut buf, &[1.5, -2.5]).unwrap();
        write_i64_seq(&mut buf, &[]).unwrap();
        write_i8_seq(&mut buf, &[-127, 0, 127]).unwrap();

        let mut r = Cursor::new(buf);
        assert_eq!(read_f32_seq(&mut r).unwrap(), vec![1.5, -2.5]);
        assert_eq!(read_i64_seq(&mut r).unwrap(), Vec::<i64>::new());
        assert_eq!(read_i8_seq(&mut r).unwrap(), vec![-127, 0, 127]);
    }

    #[test]
    fn bool_byte_out_of_range_is_a_format_error() {
        let mut r = Cursor::new(vec![2u8]);
        assert!(matches!(read_bool(&mut r), Err(Error::Format(_))));
    }

    #[test]
    fn short_read_is_an_io_error() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 10).unwrap(); // claims ten elements, stores none
        let mut r = Cursor::new(buf);
        assert!(matches!(read_f32_seq(&mut r), Err(Error::Io(_))));
    }
}
