//! zlib compression for stored values.
//!
//! The codec is stateless. The level is chosen once, when the store is
//! built, and every value in the store is the output of [`compress`].

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// Error type for codec operations.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("compression failed: {0}")]
    Compression(#[source] io::Error),

    #[error("decompression failed: {0}")]
    Decompression(#[source] io::Error),
}

/// Compression level, from no compression up to the maximum zlib grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompLevel {
    /// Library-chosen default (zlib level 6).
    #[default]
    Default,
    None,
    Minimal,
    VeryLow,
    Low,
    MediumLow,
    Medium,
    MediumHigh,
    High,
    VeryHigh,
    Maximum,
}

impl CompLevel {
    /// The zlib integer for this level; `-1` means default.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Default => -1,
            Self::None => 0,
            Self::Minimal => 1,
            Self::VeryLow => 2,
            Self::Low => 3,
            Self::MediumLow => 4,
            Self::Medium => 5,
            Self::MediumHigh => 6,
            Self::High => 7,
            Self::VeryHigh => 8,
            Self::Maximum => 9,
        }
    }

    fn compression(self) -> Compression {
        match self {
            Self::Default => Compression::default(),
            other => Compression::new(other.as_i32() as u32),
        }
    }
}

/// Error returned when an integer is not a valid compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("compression level {0} is out of range (expected -1..=9)")]
pub struct InvalidCompLevel(pub i32);

impl TryFrom<i32> for CompLevel {
    type Error = InvalidCompLevel;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            -1 => Self::Default,
            0 => Self::None,
            1 => Self::Minimal,
            2 => Self::VeryLow,
            3 => Self::Low,
            4 => Self::MediumLow,
            5 => Self::Medium,
            6 => Self::MediumHigh,
            7 => Self::High,
            8 => Self::VeryHigh,
            9 => Self::Maximum,
            other => return Err(InvalidCompLevel(other)),
        })
    }
}

impl fmt::Display for CompLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Compress `data` as a zlib stream.
pub fn compress(data: &[u8], level: CompLevel) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), level.compression());
    encoder.write_all(data).map_err(CodecError::Compression)?;
    encoder.finish().map_err(CodecError::Compression)
}

/// Decompress a zlib stream produced by [`compress`].
///
/// Truncated or corrupted input, trailing bytes, and input that was never
/// compressed all fail with [`CodecError::Decompression`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len().saturating_mul(2).max(64));

    loop {
        let (in_before, out_before) = (inflater.total_in(), inflater.total_out());
        let consumed = in_before as usize;
        let status = inflater
            .decompress_vec(&data[consumed..], &mut out, FlushDecompress::Finish)
            .map_err(|e| invalid_data(e.to_string()))?;

        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                if out.len() == out.capacity() {
                    out.reserve(out.capacity());
                    continue;
                }
                let stalled =
                    inflater.total_in() == in_before && inflater.total_out() == out_before;
                if stalled || inflater.total_in() as usize == data.len() {
                    return Err(invalid_data("truncated zlib stream".to_string()));
                }
            }
        }
    }

    if inflater.total_in() as usize != data.len() {
        return Err(invalid_data("trailing data after zlib stream".to_string()));
    }
    Ok(out)
}

fn invalid_data(msg: String) -> CodecError {
    CodecError::Decompression(io::Error::new(io::ErrorKind::InvalidData, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_roundtrip_default_level() {
        let data = b"hello hello hello hello";
        let packed = compress(data, CompLevel::Default).unwrap();
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_empty_stream_rejected() {
        assert!(decompress(b"").is_err());
    }

    #[test]
    fn test_empty_input() {
        let packed = compress(b"", CompLevel::Maximum).unwrap();
        assert!(!packed.is_empty());
        assert!(decompress(&packed).unwrap().is_empty());
    }

    #[test]
    fn test_deterministic_for_level() {
        let data = vec![b'x'; 4096];
        let a = compress(&data, CompLevel::Medium).unwrap();
        let b = compress(&data, CompLevel::Medium).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_higher_level_not_larger_on_repetitive_input() {
        let data = b"abcabcabcabcabcabcabcabcabcabcabcabc".repeat(64);
        let none = compress(&data, CompLevel::None).unwrap();
        let max = compress(&data, CompLevel::Maximum).unwrap();
        assert!(max.len() < none.len());
    }

    #[test]
    fn test_uncompressed_input_rejected() {
        let err = decompress(b"plain text, never compressed").unwrap_err();
        assert!(matches!(err, CodecError::Decompression(_)));
    }

    #[test]
    fn test_truncated_input_rejected() {
        let packed = compress(b"some value that will be cut short", CompLevel::Default).unwrap();
        let err = decompress(&packed[..packed.len() - 3]).unwrap_err();
        assert!(matches!(err, CodecError::Decompression(_)));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut packed = compress(b"value", CompLevel::Default).unwrap();
        packed.extend_from_slice(b"junk");
        assert!(decompress(&packed).is_err());
    }

    #[test]
    fn test_level_conversion() {
        assert_eq!(CompLevel::try_from(-1), Ok(CompLevel::Default));
        assert_eq!(CompLevel::try_from(9), Ok(CompLevel::Maximum));
        assert_eq!(CompLevel::try_from(10), Err(InvalidCompLevel(10)));
        assert_eq!(CompLevel::try_from(-2), Err(InvalidCompLevel(-2)));
        for n in -1..=9 {
            assert_eq!(CompLevel::try_from(n).unwrap().as_i32(), n);
        }
    }

    proptest! {
        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..2048), level in -1i32..=9) {
            let level = CompLevel::try_from(level).unwrap();
            let packed = compress(&data, level).unwrap();
            prop_assert_eq!(decompress(&packed).unwrap(), data);
        }
    }
}
