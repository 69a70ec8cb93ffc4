//! Block compression for run files. Backends other than `None` exist only
//! when their cargo feature is enabled; the codec byte in every block header
//! lets a reader reject blocks it cannot decode.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Codec {
    #[default]
    None = 0,
    Zstd = 1,
    Lz4 = 2,
}

impl Codec {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Codec::None),
            1 => Ok(Codec::Zstd),
            2 => Ok(Codec::Lz4),
            _ => Err(Error::CodecUnsupported("unknown")),
        }
    }

    /// Whether this build can encode/decode with the codec.
    pub fn is_available(self) -> bool {
        match self {
            Codec::None => true,
            Codec::Zstd => cfg!(feature = "zstd"),
            Codec::Lz4 => cfg!(feature = "lz4"),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Zstd => "zstd",
            Codec::Lz4 => "lz4",
        }
    }
}

impl std::str::FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Codec::None),
            "zstd" => Ok(Codec::Zstd),
            "lz4" => Ok(Codec::Lz4),
            _ => Err(Error::CodecUnsupported("unknown")),
        }
    }
}

impl Codec {
    /// Compress one block payload.
    pub fn encode(self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Codec::None => Ok(input.to_vec()),
            Codec::Zstd => zstd_backend::encode(input),
            Codec::Lz4 => lz4_backend::encode(input),
        }
    }

    pub fn decode(self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Codec::None => Ok(input.to_vec()),
            Codec::Zstd => zstd_backend::decode(input),
            Codec::Lz4 => lz4_backend::decode(input),
        }
    }
}

#[cfg(feature = "zstd")]
mod zstd_backend {
    use super::*;

    const LEVEL: i32 = 3;

    pub(super) fn encode(input: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(input, LEVEL).map_err(|e| Error::Codec(format!("zstd encode: {e}")))
    }

    pub(super) fn decode(input: &[u8]) -> Result<Vec<u8>> {
        zstd::stream::decode_all(input).map_err(|e| Error::Codec(format!("zstd decode: {e}")))
    }
}

#[cfg(not(feature = "zstd"))]
mod zstd_backend {
    use super::*;

    pub(super) fn encode(_: &[u8]) -> Result<Vec<u8>> {
        Err(Error::CodecUnsupported("zstd"))
    }

    pub(super) fn decode(_: &[u8]) -> Result<Vec<u8>> {
        Err(Error::CodecUnsupported("zstd"))
    }
}

#[cfg(feature = "lz4")]
mod lz4_backend {
    use super::*;

    pub(super) fn encode(input: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(input))
    }

    pub(super) fn decode(input: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(input).map_err(|e| Error::Codec(format!("lz4 decode: {e}")))
    }
}

#[cfg(not(feature = "lz4"))]
mod lz4_backend {
    use super::*;

    pub(super) fn encode(_: &[u8]) -> Result<Vec<u8>> {
        Err(Error::CodecUnsupported("lz4"))
    }

    pub(super) fn decode(_: &[u8]) -> Result<Vec<u8>> {
        Err(Error::CodecUnsupported("lz4"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let data = b"abcabcabc".to_vec();
        let c = Codec::None.encode(&data).unwrap();
        assert_eq!(Codec::None.decode(&c).unwrap(), data);
    }

    #[test]
    fn parse_names() {
        assert_eq!("ZSTD".parse::<Codec>().unwrap(), Codec::Zstd);
        assert_eq!("".parse::<Codec>().unwrap(), Codec::None);
        assert!("brotli".parse::<Codec>().is_err());
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn zstd_shrinks_repetitive_blocks() {
        let data = vec![7u8; 4096];
        let c = Codec::Zstd.encode(&data).unwrap();
        assert!(c.len() < data.len());
        assert_eq!(Codec::Zstd.decode(&c).unwrap(), data);
    }

    #[cfg(not(feature = "lz4"))]
    #[test]
    fn missing_backend_is_reported() {
        assert!(matches!(
            Codec::Lz4.encode(b"x"),
            Err(Error::CodecUnsupported("lz4"))
        ));
    }
}
