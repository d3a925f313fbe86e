//! Binary array decoding shared by the mzML and mzXML loaders
//!
//! Both formats store numeric arrays as Base64 text, optionally zlib
//! compressed. The pipeline is:
//!
//! 1. Base64 decode the text
//! 2. Decompress if needed (zlib)
//! 3. Interpret bytes as float32 or float64 in the format's byte order
//!
//! mzML is little-endian; mzXML uses network (big-endian) order.

use std::io::{Cursor, Read};

use base64::prelude::*;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;

/// Compression applied to a binary array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression (raw binary)
    #[default]
    None,
    /// zlib compression
    Zlib,
}

/// Numeric precision of a binary array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    #[default]
    Float64,
}

impl Precision {
    /// Get the byte size per value
    pub fn byte_size(&self) -> usize {
        match self {
            Precision::Float32 => 4,
            Precision::Float64 => 8,
        }
    }

    /// Parse an mzXML `precision` attribute (`32` or `64`)
    pub fn from_bits(bits: &str) -> Option<Self> {
        match bits.trim() {
            "32" => Some(Precision::Float32),
            "64" => Some(Precision::Float64),
            _ => None,
        }
    }
}

/// Byte order of the encoded floats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Little-endian (mzML)
    Little,
    /// Big-endian / network order (mzXML)
    Big,
}

/// Errors that can occur during binary decoding
#[derive(Debug, thiserror::Error)]
pub enum BinaryDecodeError {
    /// Base64 text could not be decoded
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// zlib stream could not be inflated
    #[error("Decompression error: {0}")]
    DecompressionError(#[from] std::io::Error),

    /// Decoded byte or value count does not match expectations
    #[error("Invalid data length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected count
        expected: usize,
        /// Actual count
        actual: usize,
    },
}

/// Decoder for Base64 binary arrays
pub struct BinaryDecoder;

impl BinaryDecoder {
    /// Decode a Base64-encoded binary array
    ///
    /// # Arguments
    /// * `base64_data` - The Base64 text content of the array element
    /// * `precision` - The numerical precision (32 or 64 bit)
    /// * `compression` - The compression type
    /// * `endian` - Byte order of the floats
    /// * `expected_length` - Expected number of values, if known
    pub fn decode(
        base64_data: &str,
        precision: Precision,
        compression: Compression,
        endian: Endian,
        expected_length: Option<usize>,
    ) -> Result<Vec<f64>, BinaryDecodeError> {
        let trimmed: String = base64_data.split_whitespace().collect();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let decoded_bytes = BASE64_STANDARD.decode(trimmed.as_bytes())?;

        let uncompressed = match compression {
            Compression::None => decoded_bytes,
            Compression::Zlib => {
                let mut decoder = ZlibDecoder::new(&decoded_bytes[..]);
                let mut uncompressed = Vec::new();
                decoder.read_to_end(&mut uncompressed)?;
                uncompressed
            }
        };

        let values = Self::bytes_to_floats(&uncompressed, precision, endian)?;

        if let Some(expected) = expected_length {
            if values.len() != expected {
                return Err(BinaryDecodeError::InvalidLength {
                    expected,
                    actual: values.len(),
                });
            }
        }

        Ok(values)
    }

    fn bytes_to_floats(
        bytes: &[u8],
        precision: Precision,
        endian: Endian,
    ) -> Result<Vec<f64>, BinaryDecodeError> {
        let byte_size = precision.byte_size();

        if bytes.len() % byte_size != 0 {
            return Err(BinaryDecodeError::InvalidLength {
                expected: bytes.len() / byte_size * byte_size,
                actual: bytes.len(),
            });
        }

        let count = bytes.len() / byte_size;
        let mut values = Vec::with_capacity(count);
        let mut cursor = Cursor::new(bytes);

        for _ in 0..count {
            let value = match (precision, endian) {
                (Precision::Float32, Endian::Little) => cursor.read_f32::<LittleEndian>()? as f64,
                (Precision::Float32, Endian::Big) => cursor.read_f32::<BigEndian>()? as f64,
                (Precision::Float64, Endian::Little) => cursor.read_f64::<LittleEndian>()?,
                (Precision::Float64, Endian::Big) => cursor.read_f64::<BigEndian>()?,
            };
            values.push(value);
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_float64_little_endian() {
        // 100.0 and 200.0 as little-endian doubles
        let bytes: [u8; 16] = [
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x59, 0x40, // 100.0
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x69, 0x40, // 200.0
        ];
        let encoded = BASE64_STANDARD.encode(bytes);

        let result = BinaryDecoder::decode(
            &encoded,
            Precision::Float64,
            Compression::None,
            Endian::Little,
            Some(2),
        )
        .unwrap();

        assert_eq!(result, vec![100.0, 200.0]);
    }

    #[test]
    fn test_decode_float32_network_order() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&70.5f32.to_be_bytes());
        bytes.extend_from_slice(&1234.0f32.to_be_bytes());
        let encoded = BASE64_STANDARD.encode(&bytes);

        let result =
            BinaryDecoder::decode(&encoded, Precision::Float32, Compression::None, Endian::Big, None)
                .unwrap();

        assert_eq!(result, vec![70.5, 1234.0]);
    }

    #[test]
    fn test_decode_empty() {
        let result =
            BinaryDecoder::decode("", Precision::Float64, Compression::None, Endian::Little, None)
                .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_decode_zlib_compressed() {
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let values: Vec<f64> = vec![100.0, 200.0, 300.0, 400.0];
        let mut bytes = Vec::new();
        for v in &values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&bytes).unwrap();
        let compressed = encoder.finish().unwrap();
        let encoded = BASE64_STANDARD.encode(&compressed);

        let result = BinaryDecoder::decode(
            &encoded,
            Precision::Float64,
            Compression::Zlib,
            Endian::Little,
            Some(4),
        )
        .unwrap();

        assert_eq!(result, values);
    }

    #[test]
    fn test_length_mismatch_is_reported() {
        let encoded = BASE64_STANDARD.encode(1.0f64.to_le_bytes());
        let err = BinaryDecoder::decode(
            &encoded,
            Precision::Float64,
            Compression::None,
            Endian::Little,
            Some(3),
        )
        .unwrap_err();
        assert!(matches!(err, BinaryDecodeError::InvalidLength { expected: 3, actual: 1 }));
    }
}
