//! Conversions between characteristic values and raw bytes.

use super::error::CodecError;

/// Decodes a value from the raw bytes of a characteristic.
pub trait Decode: Sized {
    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;
}

/// Encodes a value into the raw bytes written to a characteristic.
pub trait Encode {
    fn encode(&self) -> Result<Vec<u8>, CodecError>;
}

impl Decode for Vec<u8> {
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bytes.to_vec())
    }
}

impl Encode for Vec<u8> {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.clone())
    }
}

impl Encode for [u8] {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.to_vec())
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.to_vec())
    }
}

impl Decode for String {
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CodecError::new(format!("invalid UTF-8: {e}")))
    }
}

impl Encode for String {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Encode for str {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Decode for bool {
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        CodecError::check_len(bytes, 1)?;
        match bytes[0] {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(CodecError::new(format!("invalid boolean byte 0x{b:02x}"))),
        }
    }
}

impl Encode for bool {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(vec![*self as u8])
    }
}

// GATT integers are little-endian.
macro_rules! impl_le_int {
    ($($ty:ty),*) => {$(
        impl Decode for $ty {
            fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
                CodecError::check_len(bytes, std::mem::size_of::<$ty>())?;
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                Ok(<$ty>::from_le_bytes(buf))
            }
        }

        impl Encode for $ty {
            fn encode(&self) -> Result<Vec<u8>, CodecError> {
                Ok(self.to_le_bytes().to_vec())
            }
        }
    )*};
}

impl_le_int!(u8, u16, u32, u64, i8, i16, i32, i64);
