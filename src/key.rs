//! Text-or-bytes inputs and their normalization to bytes.
//!
//! Keys and values may be supplied as text or as raw bytes. Text is encoded
//! with the store's [`Encoding`] on every call, so `"a"` and `b"a"` address
//! the same entry.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Text encoding used to turn textual keys and values into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
}

impl Encoding {
    /// Encode `text`, failing if it contains characters the encoding cannot
    /// represent.
    pub fn encode<'a>(self, text: &'a str) -> Result<&'a [u8], EncodeError> {
        match self {
            Self::Utf8 => Ok(text.as_bytes()),
            Self::Ascii => match text.char_indices().find(|(_, c)| !c.is_ascii()) {
                None => Ok(text.as_bytes()),
                Some((position, character)) => Err(EncodeError {
                    encoding: self,
                    character,
                    position,
                }),
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Ascii => "ASCII",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            _ => Err(format!("unknown encoding: {s}")),
        }
    }
}

/// A character the configured encoding cannot represent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{encoding} cannot encode {character:?} at byte {position}")]
pub struct EncodeError {
    pub encoding: Encoding,
    pub character: char,
    pub position: usize,
}

/// A key or value as supplied by a caller: text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    Text(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
}

impl<'a> Input<'a> {
    /// Normalize to bytes using `encoding`. Bytes pass through untouched.
    pub fn to_bytes(&self, encoding: Encoding) -> Result<Vec<u8>, EncodeError> {
        match self {
            Self::Text(text) => encoding.encode(text).map(<[u8]>::to_vec),
            Self::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }
}

impl<'a> From<&'a str> for Input<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(Cow::Borrowed(value))
    }
}

impl From<String> for Input<'static> {
    fn from(value: String) -> Self {
        Self::Text(Cow::Owned(value))
    }
}

impl<'a> From<&'a String> for Input<'a> {
    fn from(value: &'a String) -> Self {
        Self::Text(Cow::Borrowed(value.as_str()))
    }
}

impl<'a> From<&'a [u8]> for Input<'a> {
    fn from(value: &'a [u8]) -> Self {
        Self::Bytes(Cow::Borrowed(value))
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Input<'a> {
    fn from(value: &'a [u8; N]) -> Self {
        Self::Bytes(Cow::Borrowed(value.as_slice()))
    }
}

impl From<Vec<u8>> for Input<'static> {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Cow::Owned(value))
    }
}

impl<'a> From<&'a Vec<u8>> for Input<'a> {
    fn from(value: &'a Vec<u8>) -> Self {
        Self::Bytes(Cow::Borrowed(value.as_slice()))
    }
}

/// Render a byte key for logs and error messages.
pub(crate) fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}
