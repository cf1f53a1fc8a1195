//! Recursive Length Prefix codec.
//!
//! Encoding rules:
//! - Single byte [0x00, 0x7f]: itself
//! - String [0x80, 0xb7]: 0x80 + len, then data
//! - String [0xb8, 0xbf]: 0xb7 + len_of_len, then len, then data
//! - List [0xc0, 0xf7]: 0xc0 + len, then items
//! - List [0xf8, 0xff]: 0xf7 + len_of_len, then len, then items
//!
//! The decoder rejects non-canonical encodings and bounds nesting depth.

use alloc::vec;
use alloc::vec::Vec;

/// Maximum RLP nesting depth accepted by the decoder.
const MAX_DEPTH: usize = 16;

/// RLP decoding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlpError {
    /// Input is empty when data expected.
    EmptyInput,
    /// Input too short for declared length.
    UnexpectedEof,
    /// Non-canonical encoding (leading zeros, or long form for a short payload).
    NonCanonical,
    /// Single byte below 0x80 wrapped in a string header.
    SingleByteMismatch,
    /// Length field does not fit in usize.
    LengthOverflow,
    /// Exceeded maximum nesting depth.
    TooDeep,
    /// Extra data after the top-level item.
    TrailingData,
}

/// A decoded RLP item, borrowing from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem<'a> {
    /// A byte string (may be empty).
    String(&'a [u8]),
    /// A list of items.
    List(Vec<RlpItem<'a>>),
}

impl<'a> RlpItem<'a> {
    /// Returns the string data if this is a string item.
    pub fn as_string(&self) -> Option<&'a [u8]> {
        match self {
            RlpItem::String(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the list items if this is a list item.
    pub fn as_list(&self) -> Option<&[RlpItem<'a>]> {
        match self {
            RlpItem::List(items) => Some(items),
            _ => None,
        }
    }

    /// Interprets the string as a canonical big-endian u64.
    pub fn as_u64(&self) -> Option<u64> {
        let data = self.as_string()?;
        if data.len() > 8 || (data.len() > 1 && data[0] == 0) {
            return None;
        }
        Some(data.iter().fold(0u64, |acc, &b| acc << 8 | b as u64))
    }
}

/// Decodes one RLP item and returns it with the remaining input.
pub fn decode(input: &[u8]) -> Result<(RlpItem<'_>, &[u8]), RlpError> {
    decode_at_depth(input, 0)
}

/// Decodes a complete RLP item, rejecting trailing data.
pub fn decode_exact(input: &[u8]) -> Result<RlpItem<'_>, RlpError> {
    let (item, rest) = decode(input)?;
    if !rest.is_empty() {
        return Err(RlpError::TrailingData);
    }
    Ok(item)
}

fn decode_at_depth(input: &[u8], depth: usize) -> Result<(RlpItem<'_>, &[u8]), RlpError> {
    if depth > MAX_DEPTH {
        return Err(RlpError::TooDeep);
    }
    let first = *input.first().ok_or(RlpError::EmptyInput)?;

    match first {
        0x00..=0x7f => Ok((RlpItem::String(&input[..1]), &input[1..])),
        0x80..=0xb7 => {
            let (payload, rest) = split_payload(input, 1, (first - 0x80) as usize)?;
            if payload.len() == 1 && payload[0] < 0x80 {
                return Err(RlpError::SingleByteMismatch);
            }
            Ok((RlpItem::String(payload), rest))
        }
        0xb8..=0xbf => {
            let (len_of_len, len) = long_length(input, first - 0xb7)?;
            let (payload, rest) = split_payload(input, 1 + len_of_len, len)?;
            Ok((RlpItem::String(payload), rest))
        }
        0xc0..=0xf7 => {
            let (payload, rest) = split_payload(input, 1, (first - 0xc0) as usize)?;
            Ok((RlpItem::List(decode_items(payload, depth + 1)?), rest))
        }
        0xf8..=0xff => {
            let (len_of_len, len) = long_length(input, first - 0xf7)?;
            let (payload, rest) = split_payload(input, 1 + len_of_len, len)?;
            Ok((RlpItem::List(decode_items(payload, depth + 1)?), rest))
        }
    }
}

// Reads the big-endian length that follows a long-form header byte.
fn long_length(input: &[u8], len_of_len: u8) -> Result<(usize, usize), RlpError> {
    let len_of_len = len_of_len as usize;
    let len_bytes = input.get(1..1 + len_of_len).ok_or(RlpError::UnexpectedEof)?;
    if len_bytes[0] == 0 {
        return Err(RlpError::NonCanonical);
    }
    if len_bytes.len() > core::mem::size_of::<usize>() {
        return Err(RlpError::LengthOverflow);
    }
    let len = len_bytes.iter().fold(0usize, |acc, &b| acc << 8 | b as usize);
    if len < 56 {
        return Err(RlpError::NonCanonical);
    }
    Ok((len_of_len, len))
}

fn split_payload(input: &[u8], start: usize, len: usize) -> Result<(&[u8], &[u8]), RlpError> {
    let end = start.checked_add(len).ok_or(RlpError::LengthOverflow)?;
    if input.len() < end {
        return Err(RlpError::UnexpectedEof);
    }
    Ok((&input[start..end], &input[end..]))
}

fn decode_items(mut data: &[u8], depth: usize) -> Result<Vec<RlpItem<'_>>, RlpError> {
    let mut items = Vec::new();
    while !data.is_empty() {
        let (item, rest) = decode_at_depth(data, depth)?;
        items.push(item);
        data = rest;
    }
    Ok(items)
}

/// Strips leading zero bytes, giving the minimal big-endian form of an integer.
pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Encodes a u64 as an RLP integer.
pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_bytes(trim_leading_zeros(&value.to_be_bytes()))
}

/// Encodes a byte string.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return data.to_vec();
    }
    with_header(0x80, data)
}

/// Wraps already-encoded items into a list.
pub fn encode_list(items: &[u8]) -> Vec<u8> {
    with_header(0xc0, items)
}

fn with_header(offset: u8, payload: &[u8]) -> Vec<u8> {
    let mut result = if payload.len() <= 55 {
        vec![offset + payload.len() as u8]
    } else {
        let len_bytes = payload.len().to_be_bytes();
        let len_bytes = trim_leading_zeros(&len_bytes);
        let mut header = vec![offset + 55 + len_bytes.len() as u8];
        header.extend_from_slice(len_bytes);
        header
    };
    result.extend_from_slice(payload);
    result
}
