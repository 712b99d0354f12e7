// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Minimal reader for Solidity ABI encoded event payloads.
//!
//! Only the shapes the Lens hub events use are supported: static words read as
//! `uint256` (narrowed to `i64`) or `address`, and dynamic `string`s reached
//! through a head offset.

use super::DecodeError;

const WORD: usize = 32;

pub struct AbiData {
    bytes: Vec<u8>,
}

impl AbiData {
    pub fn from_hex(data: &str) -> Result<Self, DecodeError> {
        Ok(Self {
            bytes: decode_hex(data)?,
        })
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&[u8], DecodeError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(DecodeError::OutOfBounds {
                offset,
                len,
                available: self.bytes.len(),
            })
    }

    fn word(&self, index: usize) -> Result<&[u8], DecodeError> {
        self.slice(index * WORD, WORD)
    }

    pub fn uint(&self, index: usize) -> Result<i64, DecodeError> {
        word_to_i64(self.word(index)?)
    }

    pub fn address(&self, index: usize) -> Result<String, DecodeError> {
        word_to_address(self.word(index)?)
    }

    pub fn string(&self, index: usize) -> Result<String, DecodeError> {
        let offset = word_to_usize(self.word(index)?)?;
        let len = word_to_usize(self.slice(offset, WORD)?)?;
        let raw = self.slice(offset + WORD, len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { index })
    }
}

/// Read an indexed `uint256` topic.
pub fn topic_uint(topic: &str) -> Result<i64, DecodeError> {
    word_to_i64(&topic_word(topic)?)
}

/// Read an indexed `address` topic.
pub fn topic_address(topic: &str) -> Result<String, DecodeError> {
    word_to_address(&topic_word(topic)?)
}

fn topic_word(topic: &str) -> Result<Vec<u8>, DecodeError> {
    let bytes = decode_hex(topic)?;
    if bytes.len() != WORD {
        return Err(DecodeError::BadTopicLength(bytes.len()));
    }
    Ok(bytes)
}

fn decode_hex(s: &str) -> Result<Vec<u8>, DecodeError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(s)?)
}

fn word_to_i64(word: &[u8]) -> Result<i64, DecodeError> {
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|b| *b != 0) {
        return Err(DecodeError::NumberOverflow);
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(low);
    i64::try_from(u64::from_be_bytes(buf)).map_err(|_| DecodeError::NumberOverflow)
}

fn word_to_usize(word: &[u8]) -> Result<usize, DecodeError> {
    word_to_i64(word).and_then(|n| usize::try_from(n).map_err(|_| DecodeError::NumberOverflow))
}

fn word_to_address(word: &[u8]) -> Result<String, DecodeError> {
    Ok(format!("0x{}", hex::encode(&word[WORD - 20..])))
}
