//! Wire-level encoding helpers shared by the block codec and the
//! streaming frame format: LEB128 varints (spec.md §4.1
//! `varint(index)`, `varint(payloadLen)`, ...) and base64 for
//! human-shareable and JSON-embedded byte fields (spec.md §6 "Local
//! safe envelope ... all byte fields base64-prefixed").

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::errors::WardError;

/// Maximum varint length this codec accepts (10 bytes covers a full u64).
const MAX_VARINT_BYTES: usize = 10;

/// Append the LEB128 varint encoding of `value` to `out`.
pub fn write_varint(value: u64, out: &mut Vec<u8>) {
    let mut v = value;
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if v == 0 {
            break;
        }
    }
}

/// Read a LEB128 varint from the front of `input`, returning the value
/// and the remaining slice. Fails with [`WardError::InvalidFormat`] on
/// truncated or overlong input (spec.md §4.1 "*InvalidFormat* on
/// truncated input").
pub fn read_varint(input: &[u8]) -> Result<(u64, &[u8]), WardError> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in input.iter().enumerate() {
        if i >= MAX_VARINT_BYTES {
            return Err(WardError::invalid_format("varint too long"));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, &input[i + 1..]));
        }
        shift += 7;
    }
    Err(WardError::invalid_format("truncated varint"))
}

/// Split a fixed-size prefix off `input`, failing with
/// [`WardError::InvalidFormat`] if `input` is shorter than `len`.
pub fn take_fixed<'a>(input: &'a [u8], len: usize) -> Result<(&'a [u8], &'a [u8]), WardError> {
    if input.len() < len {
        return Err(WardError::invalid_format(format!(
            "expected at least {len} bytes, got {}",
            input.len()
        )));
    }
    Ok(input.split_at(len))
}

/// Split a varint-prefixed length-delimited field off `input`.
pub fn take_length_prefixed(input: &[u8]) -> Result<(&[u8], &[u8]), WardError> {
    let (len, rest) = read_varint(input)?;
    let len = usize::try_from(len).map_err(|_| WardError::invalid_format("length overflow"))?;
    take_fixed(rest, len)
}

/// Encode bytes as standard base64, used for JSON-embedded fields in
/// the local safe envelope and for human-shareable identity strings.
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

/// Decode a standard base64 string.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, WardError> {
    BASE64_STANDARD
        .decode(encoded)
        .map_err(WardError::from)
}

/// A `serde(with = "...")` helper for fixed-size byte arrays that
/// should be base64 strings in JSON rather than arrays of numbers
/// (spec.md §6 "Local safe envelope ... all byte fields
/// base64-prefixed"). Use as `#[serde(with = "base64_array")]` on a
/// `[u8; N]` field.
pub mod base64_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::encode_base64(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = super::decode_base64(&encoded).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("base64 field had unexpected length"))
    }
}

/// Same as [`base64_array`] but for variable-length byte vectors.
pub mod base64_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::encode_base64(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        super::decode_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn varint_round_trips_small_values() {
        for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(v, &mut buf);
            let (decoded, rest) = read_varint(&buf).expect("decode");
            assert_eq!(decoded, v);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn truncated_varint_is_invalid_format() {
        let buf = vec![0x80, 0x80];
        assert!(read_varint(&buf).is_err());
    }

    #[test]
    fn base64_round_trips() {
        let bytes = b"wardchain";
        let encoded = encode_base64(bytes);
        assert_eq!(decode_base64(&encoded).expect("decode"), bytes);
    }

    proptest! {
        #[test]
        fn varint_round_trip_prop(v: u64) {
            let mut buf = Vec::new();
            write_varint(v, &mut buf);
            let (decoded, rest) = read_varint(&buf).expect("decode");
            prop_assert_eq!(decoded, v);
            prop_assert!(rest.is_empty());
        }
    }
}
