// src/tokenizer/decoder.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tokenizer::normalizer::META_SYMBOL;
use crate::tokenizer::vocab::byte_value;
use crate::tokenizer::Result;

/// What decode does when reassembled byte pieces are not valid UTF-8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Fail with `Error::Decode`.
    #[default]
    Strict,
    /// Substitute U+FFFD for each invalid sequence.
    Replace,
}

impl FromStr for DecodePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "replace" => Ok(Self::Replace),
            _ => Err(format!(
                "invalid decode policy: {s:?} (expected \"strict\" or \"replace\")"
            )),
        }
    }
}

impl fmt::Display for DecodePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::Replace => f.write_str("replace"),
        }
    }
}

fn flush_bytes(bytes: &mut Vec<u8>, out: &mut String, policy: DecodePolicy) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    match policy {
        DecodePolicy::Strict => out.push_str(&String::from_utf8(std::mem::take(bytes))?),
        DecodePolicy::Replace => {
            out.push_str(&String::from_utf8_lossy(bytes.as_slice()));
            bytes.clear();
        }
    }
    Ok(())
}

/// Turns a piece sequence back into text.
///
/// Contiguous `<0xHH>` pieces are reassembled into raw bytes and decoded as
/// UTF-8; every other surface is copied as is. Meta symbols then become spaces
/// and a single leading space (the word-start of the first piece) is dropped.
pub fn decode_surfaces<'a, I>(surfaces: I, policy: DecodePolicy) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut text = String::new();
    let mut bytes = Vec::new();
    for surface in surfaces {
        match byte_value(surface) {
            Some(byte) => bytes.push(byte),
            None => {
                flush_bytes(&mut bytes, &mut text, policy)?;
                text.push_str(surface);
            }
        }
    }
    flush_bytes(&mut bytes, &mut text, policy)?;

    let text = text.replace(META_SYMBOL, " ");
    Ok(match text.strip_prefix(' ') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}
