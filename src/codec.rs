//! The bytewise codec: an order-preserving byte encoding for the dynamically
//! typed value tree in [`crate::value::Value`]. `memcmp` order of the
//! produced byte strings matches the logical order of the encoded values.

use crate::error::CodecError;
use crate::value::{Timestamp, Value};

const TAG_NULL: u8 = 0x10;
const TAG_FALSE: u8 = 0x20;
const TAG_TRUE: u8 = 0x21;
const TAG_NEG_INF: u8 = 0x40;
const TAG_NEG: u8 = 0x41;
const TAG_POS: u8 = 0x42;
const TAG_POS_INF: u8 = 0x43;
const TAG_DATE_NEG: u8 = 0x51;
const TAG_DATE_POS: u8 = 0x52;
const TAG_STRING: u8 = 0x70;
const TAG_LIST: u8 = 0xA0;
const END: u8 = 0x00;

/// Encode a [`Value`] to its bytewise byte string.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    encode_into(value, &mut out)?;
    Ok(out)
}

fn encode_into(value: &Value, out: &mut Vec<u8>) -> Result<(), CodecError> {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(false) => out.push(TAG_FALSE),
        Value::Bool(true) => out.push(TAG_TRUE),
        Value::Num(n) => encode_num(*n, out)?,
        Value::Time(t) => encode_time(*t, out),
        Value::Str(s) => encode_str(s, out)?,
        Value::List(items) => {
            out.push(TAG_LIST);
            for item in items {
                encode_into(item, out)?;
                out.push(END);
            }
            out.push(END);
        }
    }
    Ok(())
}

fn encode_num(n: f64, out: &mut Vec<u8>) -> Result<(), CodecError> {
    if n.is_nan() || n.is_infinite() {
        return Err(CodecError::UnsupportedType);
    }
    // Normalize -0.0 to +0.0 so zero has a single canonical encoding.
    let n = if n == 0.0 { 0.0 } else { n };
    if n == -f64::MAX {
        out.push(TAG_NEG_INF);
    } else if n == f64::MAX {
        out.push(TAG_POS_INF);
    } else if n < 0.0 {
        out.push(TAG_NEG);
        // Bigger magnitude sorts first among negatives, so complement the
        // magnitude's IEEE bits (same trick as the POS payload, inverted).
        let magnitude_bits = (-n).to_bits();
        out.extend_from_slice(&(!magnitude_bits).to_be_bytes());
    } else {
        out.push(TAG_POS);
        out.extend_from_slice(&n.to_bits().to_be_bytes());
    }
    Ok(())
}

fn encode_time(t: Timestamp, out: &mut Vec<u8>) {
    // nanos is always encoded ascending regardless of the seconds' sign: it
    // counts forward from the seconds floor, so it must never be complemented
    // or same-second ties would sort backwards.
    if t.seconds < 0 {
        out.push(TAG_DATE_NEG);
        let magnitude = t.seconds.unsigned_abs();
        out.extend_from_slice(&(!magnitude).to_be_bytes());
    } else {
        out.push(TAG_DATE_POS);
        out.extend_from_slice(&t.seconds.to_be_bytes());
    }
    out.extend_from_slice(&(t.nanos as u64).to_be_bytes());
}

fn encode_str(s: &str, out: &mut Vec<u8>) -> Result<(), CodecError> {
    if s.as_bytes().contains(&0x00) {
        return Err(CodecError::StringContainsNul);
    }
    out.push(TAG_STRING);
    out.extend_from_slice(s.as_bytes());
    out.push(END);
    Ok(())
}

/// Decode a [`Value`] from its bytewise byte string. The entire input must
/// be consumed; trailing bytes are an error.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    let mut dec = Decoder { buf: bytes, pos: 0 };
    let value = dec.decode_value()?;
    if dec.pos != dec.buf.len() {
        return Err(CodecError::Truncated);
    }
    Ok(value)
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn next_byte(&mut self) -> Result<u8, CodecError> {
        let b = *self.buf.get(self.pos).ok_or(CodecError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(CodecError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn take_u64(&mut self) -> Result<u64, CodecError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().map_err(|_| CodecError::Truncated)?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn decode_value(&mut self) -> Result<Value, CodecError> {
        let tag = self.next_byte()?;
        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_FALSE => Ok(Value::Bool(false)),
            TAG_TRUE => Ok(Value::Bool(true)),
            TAG_NEG_INF => Ok(Value::Num(-f64::MAX)),
            TAG_POS_INF => Ok(Value::Num(f64::MAX)),
            TAG_NEG => {
                let complemented = self.take_u64()?;
                let magnitude_bits = !complemented;
                Ok(Value::Num(-f64::from_bits(magnitude_bits)))
            }
            TAG_POS => {
                let bits = self.take_u64()?;
                Ok(Value::Num(f64::from_bits(bits)))
            }
            TAG_DATE_NEG => {
                let complemented = self.take_u64()?;
                let magnitude = !complemented;
                let seconds = (0i128 - magnitude as i128) as i64;
                let nanos = self.take_u64()? as u32;
                Ok(Value::Time(Timestamp { seconds, nanos }))
            }
            TAG_DATE_POS => {
                let seconds = self.take_u64()? as i64;
                let nanos = self.take_u64()? as u32;
                Ok(Value::Time(Timestamp { seconds, nanos }))
            }
            TAG_STRING => {
                let start = self.pos;
                loop {
                    let b = self.next_byte()?;
                    if b == END {
                        break;
                    }
                }
                let bytes = &self.buf[start..self.pos - 1];
                let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Str(s.to_string()))
            }
            TAG_LIST => {
                let mut items = Vec::new();
                loop {
                    if *self.buf.get(self.pos).ok_or(CodecError::Truncated)? == END {
                        self.pos += 1;
                        break;
                    }
                    let item = self.decode_value()?;
                    let sep = self.next_byte()?;
                    if sep != END {
                        return Err(CodecError::Truncated);
                    }
                    items.push(item);
                }
                Ok(Value::List(items))
            }
            other => Err(CodecError::CorruptTag(other)),
        }
    }
}

/// Bitwise-increment the last byte strictly less than `0xFF`, truncating
/// anything after it. Used by [`crate::key::stop`] to compute the smallest
/// byte string strictly greater than every extension of `bytes`.
pub fn increment_last_non_ff(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    while let Some(&last) = out.last() {
        if last != 0xFF {
            *out.last_mut().unwrap() += 1;
            return out;
        }
        out.pop();
    }
    // Only reachable for an all-0xFF input, which bytewise encodings never
    // produce (every encoding ends in the 0x00 END byte).
    out.push(0xFF);
    out
}
