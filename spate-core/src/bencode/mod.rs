//! Bencode data model, decoder, and encoder.
//!
//! Torrent descriptors are bencoded dictionaries, and the info dictionary's
//! exact bytes are hash-critical: re-encoding a parsed structure must never
//! change them. The decoder therefore also exposes the raw byte span of each
//! top-level dictionary entry so callers can slice the original input.

mod decode;
mod encode;
mod value;

pub use decode::{decode, decode_dict_spans};
pub use encode::encode;
pub(crate) use encode::encode_into;
pub use value::Value;

/// Errors produced while decoding bencode input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BencodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("invalid string length prefix")]
    InvalidStringLength,

    #[error("dictionary key is not a byte string")]
    NonStringKey,

    #[error("nesting exceeds maximum depth")]
    NestingTooDeep,

    #[error("trailing data after value")]
    TrailingData,

    #[error("top-level value is not a dictionary")]
    NotADictionary,
}
