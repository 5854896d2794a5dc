use crate::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Torrent identifier, always stored as 40 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoHash(String);

impl InfoHash {
    /// Accepts a 40-character hex hash (any case) or a 32-character base32
    /// hash; base32 input is decoded and re-encoded as hex.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let value = value.trim();
        match value.len() {
            40 if hex::decode(value).is_ok() => Ok(Self(value.to_ascii_lowercase())),
            32 => decode_base32(value)
                .map(|bytes| Self(hex::encode(bytes)))
                .ok_or_else(|| DomainError::InvalidInfoHash(value.to_string())),
            _ => Err(DomainError::InvalidInfoHash(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn decode_base32(value: &str) -> Option<[u8; 20]> {
    let mut out = Vec::with_capacity(20);
    let mut buffer: u32 = 0;
    let mut bits: u8 = 0;
    for ch in value.chars() {
        let val = base32_value(ch)?;
        buffer = (buffer << 5) | u32::from(val);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    out.try_into().ok()
}

fn base32_value(ch: char) -> Option<u8> {
    let ch = ch.to_ascii_uppercase();
    match ch {
        'A'..='Z' => Some((ch as u8) - b'A'),
        '2'..='7' => Some((ch as u8) - b'2' + 26),
        _ => None,
    }
}
