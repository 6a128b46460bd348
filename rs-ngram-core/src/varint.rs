//! Unsigned LEB128 varints.
//!
//! Seven payload bits per byte, least significant group first, with the
//! high bit set on every byte but the last. Only the unsigned encoding is
//! provided (no ZigZag).

use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// A u64 never needs more than ten groups of seven bits.
const MAX_LEN: usize = 10;

/// Appends the encoding of `value` to `buf`.
fn push(buf: &mut Vec<u8>, mut value: u64) {
	while value >= 0x80 {
		buf.push(0x80 | (value & 0x7f) as u8);
		value >>= 7;
	}
	buf.push(value as u8);
}

/// Encodes a single value.
pub fn encode_one(value: u64) -> Vec<u8> {
	let mut buf = Vec::with_capacity(MAX_LEN);
	push(&mut buf, value);
	buf
}

/// Encodes a sequence of values as the concatenation of their encodings.
pub fn encode(values: &[u64]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(values.len());
	for &value in values {
		push(&mut buf, value);
	}
	buf
}

/// Decodes the first value of `data`.
///
/// Returns the value and the number of bytes it occupied.
///
/// # Errors
/// - `Truncated` if `data` ends before the final byte of the value.
/// - `Corruption` if the value does not fit in 64 bits.
pub fn decode_one(data: &[u8]) -> Result<(u64, usize)> {
	let mut value = 0u64;
	for (i, &byte) in data.iter().enumerate() {
		if i == MAX_LEN {
			break;
		}
		let bits = u64::from(byte & 0x7f);
		let shift = 7 * i as u32;
		if shift == 63 && bits > 1 {
			return Err(Error::Corruption("varint overflows 64 bits".to_owned()));
		}
		value |= bits << shift;

		if byte & 0x80 == 0 {
			return Ok((value, i + 1));
		}
	}

	if data.len() >= MAX_LEN {
		Err(Error::Corruption("varint longer than 10 bytes".to_owned()))
	} else {
		Err(Error::Truncated)
	}
}

/// Decodes every value in `data`.
///
/// # Errors
/// Fails like [`decode_one`] if the stream ends in the middle of a value.
pub fn decode(data: &[u8]) -> Result<Vec<u64>> {
	let mut values = Vec::new();
	let mut rest = data;
	while !rest.is_empty() {
		let (value, used) = decode_one(rest)?;
		values.push(value);
		rest = &rest[used..];
	}
	Ok(values)
}

/// Writes a single encoded value to `writer`.
pub fn write_one<W: Write>(value: u64, writer: &mut W) -> io::Result<()> {
	let mut buf = Vec::with_capacity(MAX_LEN);
	push(&mut buf, value);
	writer.write_all(&buf)
}

/// Reads a single encoded value from `reader`.
///
/// Returns `Ok(None)` on a clean end of stream (no byte read).
///
/// # Errors
/// `Truncated` if the stream ends after a continuation byte.
pub fn read_one<R: Read>(reader: &mut R) -> Result<Option<u64>> {
	let mut buf = Vec::with_capacity(MAX_LEN);
	let mut byte = [0u8; 1];

	loop {
		if reader.read(&mut byte)? == 0 {
			if buf.is_empty() {
				return Ok(None);
			}
			return Err(Error::Truncated);
		}
		buf.push(byte[0]);
		if byte[0] & 0x80 == 0 {
			return decode_one(&buf).map(|(value, _)| Some(value));
		}
		if buf.len() == MAX_LEN {
			return Err(Error::Corruption("varint longer than 10 bytes".to_owned()));
		}
	}
}

/// First-order differences of an ascending sequence.
///
/// `[1, 2, 7, 10, 23]` becomes `[1, 1, 5, 3, 13]`. Wrapping arithmetic keeps
/// `undiff(diff(seq)) == seq` even for sequences that are not ascending.
pub fn diff(seq: &[u64]) -> Vec<u64> {
	let mut prev = 0u64;
	seq.iter()
		.map(|&value| {
			let delta = value.wrapping_sub(prev);
			prev = value;
			delta
		})
		.collect()
}

/// Inverse of [`diff`].
pub fn undiff(seq: &[u64]) -> Vec<u64> {
	let mut acc = 0u64;
	seq.iter()
		.map(|&delta| {
			acc = acc.wrapping_add(delta);
			acc
		})
		.collect()
}
