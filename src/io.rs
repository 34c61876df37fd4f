
//! Specialized binary input and output.
//! Uses the error handling for this crate.

pub use ::std::io::{Read, Write};
use lebe::prelude::*;
use crate::error::{Error, Result, UnitResult};


/// Generic trait that defines common binary operations such as reading and writing for this type.
pub trait Data: Sized + Default + Clone {
    const BYTE_SIZE: usize = ::std::mem::size_of::<Self>();

    /// Read a value of type `Self`.
    fn read(read: &mut impl Read) -> Result<Self>;

    /// Read as many values of type `Self` as fit into the specified slice.
    /// If the slice cannot be filled completely, returns `Error::Invalid`.
    fn read_slice(read: &mut impl Read, slice: &mut[Self]) -> UnitResult;

    /// Write this value to the writer.
    fn write(self, write: &mut impl Write) -> UnitResult;

    /// Write all values of that slice to the writer.
    fn write_slice(write: &mut impl Write, slice: &[Self]) -> UnitResult;
}


macro_rules! implement_data_for_primitive {
    ($kind: ident) => {
        impl Data for $kind {
            #[inline]
            fn read(read: &mut impl Read) -> Result<Self> {
                Ok(read.read_from_little_endian()?)
            }

            #[inline]
            fn write(self, write: &mut impl Write) -> Result<()> {
                write.write_as_little_endian(&self)?;
                Ok(())
            }

            #[inline]
            fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
                read.read_from_little_endian_into(slice)?;
                Ok(())
            }

            #[inline]
            fn write_slice(write: &mut impl Write, slice: &[Self]) -> Result<()> {
                write.write_as_little_endian(slice)?;
                Ok(())
            }
        }
    };
}

implement_data_for_primitive!(u8);
implement_data_for_primitive!(u16);
implement_data_for_primitive!(u32);


/// Split off the next `count` bytes of the slice,
/// or return `Error::Invalid` if not enough bytes remain.
#[inline]
pub fn take_n<'s>(slice: &mut &'s [u8], count: usize) -> Result<&'s [u8]> {
    if count <= slice.len() {
        let (front, back) = slice.split_at(count);
        *slice = back;
        Ok(front)
    }
    else {
        Err(Error::invalid("reference to missing bytes"))
    }
}

/// Skip the next `count` bytes of the slice,
/// or return `Error::Invalid` if not enough bytes remain.
#[inline]
pub fn skip_bytes(slice: &mut &[u8], count: usize) -> UnitResult {
    take_n(slice, count).map(|_| ())
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn take_checked(){
        let buffer: &[u8] = &[0, 1, 2, 3];
        let mut remaining = buffer;

        assert_eq!(take_n(&mut remaining, 1).unwrap(), &[0]);
        assert_eq!(take_n(&mut remaining, 2).unwrap(), &[1, 2]);
        assert!(take_n(&mut remaining, 2).is_err());
        assert_eq!(remaining, &[3]);

        skip_bytes(&mut remaining, 1).unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn little_endian(){
        let mut bytes = Vec::new();
        0xCCC0_u16.write(&mut bytes).unwrap();
        0xCACCACCA_u32.write(&mut bytes).unwrap();
        assert_eq!(bytes, [0xC0, 0xCC, 0xCA, 0xAC, 0xCC, 0xCA]);

        let mut read = bytes.as_slice();
        assert_eq!(u16::read(&mut read).unwrap(), 0xCCC0);
        assert_eq!(u32::read(&mut read).unwrap(), 0xCACCACCA);
        assert!(matches!(u8::read(&mut read), Err(Error::Invalid(_))));
    }
}
