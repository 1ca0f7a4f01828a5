//! Character buffers and native text encodings
//!
//! Design: Native APIs keep text in fixed `[c_char; N]` buffers in a locale
//! encoding (GB18030 is common), while the object model works in Unicode.
//! `StringCodec` converts between the two with `encoding_rs` and applies the
//! configured overflow policy when encoded text does not fit:
//! - `Reject` fails with the capacity and the required size
//! - `Truncate` keeps the longest prefix of whole characters that fits
//!
//! A write always leaves room for, and writes, the terminating NUL. Bytes
//! after the terminator are left untouched.

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::ffi::c_char;

use crate::errors::{BindError, BindResult};

/// What to do when encoded text exceeds a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    #[default]
    Reject,
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringCodec {
    encoding: &'static Encoding,
    overflow: OverflowPolicy,
}

impl Default for StringCodec {
    fn default() -> Self {
        Self::utf8()
    }
}

impl StringCodec {
    /// Codec for a WHATWG encoding label (`"gb18030"`, `"utf-8"`, `"shift_jis"`, ..)
    pub fn new(label: &str, overflow: OverflowPolicy) -> BindResult<Self> {
        let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            BindError::UnknownEncoding {
                label: label.to_string(),
            }
        })?;
        Ok(Self { encoding, overflow })
    }

    pub fn utf8() -> Self {
        Self {
            encoding: UTF_8,
            overflow: OverflowPolicy::Reject,
        }
    }

    pub const fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    #[inline]
    pub fn encoding_name(&self) -> &'static str {
        self.encoding.name()
    }

    #[inline]
    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    /// Encode; characters the encoding cannot represent are an error
    pub fn encode(&self, text: &str) -> BindResult<Vec<u8>> {
        let (bytes, _, unmappable) = self.encoding.encode(text);
        if unmappable {
            return Err(BindError::Encoding {
                encoding: self.encoding.name(),
                detail: format!("unmappable character in {:?}", text),
            });
        }
        Ok(bytes.into_owned())
    }

    /// Decode up to the first NUL; malformed sequences become U+FFFD
    pub fn decode(&self, bytes: &[u8]) -> String {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let (text, _) = self.encoding.decode_without_bom_handling(&bytes[..end]);
        text.into_owned()
    }

    /// Read a NUL-terminated buffer
    pub fn read_buffer(&self, buffer: &[c_char]) -> String {
        let bytes: Vec<u8> = buffer.iter().map(|&c| c as u8).collect();
        self.decode(&bytes)
    }

    /// Encode `text` into `buffer` with a terminator; returns bytes written
    /// before the terminator
    pub fn write_buffer(&self, text: &str, buffer: &mut [c_char]) -> BindResult<usize> {
        let capacity = buffer.len();
        let encoded = self.encode(text)?;
        let limit = capacity.saturating_sub(1);

        let bytes = if encoded.len() <= limit && capacity > 0 {
            encoded
        } else {
            match self.overflow {
                OverflowPolicy::Reject => {
                    return Err(BindError::BufferOverflow {
                        capacity,
                        size: encoded.len() + 1,
                    })
                }
                OverflowPolicy::Truncate => self.longest_prefix(text, limit)?,
            }
        };

        for (slot, byte) in buffer.iter_mut().zip(bytes.iter()) {
            *slot = *byte as c_char;
        }
        if let Some(terminator) = buffer.get_mut(bytes.len()) {
            *terminator = 0;
        }
        Ok(bytes.len())
    }

    /// Encoding of the longest whole-character prefix of `text` that fits
    /// in `limit` bytes
    fn longest_prefix(&self, text: &str, limit: usize) -> BindResult<Vec<u8>> {
        let mut end = text.len();
        loop {
            let encoded = self.encode(&text[..end])?;
            if encoded.len() <= limit {
                return Ok(encoded);
            }
            end = text[..end]
                .char_indices()
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(0);
        }
    }
}

static ACTIVE: Lazy<RwLock<StringCodec>> = Lazy::new(|| RwLock::new(StringCodec::utf8()));

/// Codec used by string parameters and string properties built without an
/// explicit codec
pub fn active_codec() -> StringCodec {
    *ACTIVE.read()
}

pub fn set_active_codec(codec: StringCodec) {
    *ACTIVE.write() = codec;
}
