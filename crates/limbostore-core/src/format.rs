//! Binary format for Writes in page backing files.
//!
//! A page file is a flat log: serialized Writes laid out contiguously in
//! insertion order, no index, no gaps. Each record is:
//!
//! RecordHeader (16 bytes) + version(u64) + record(u64) + key_len(u16) +
//! value_len(u32) + value_tag(u8) + padding(u8) + key_bytes + value_bytes

use crate::error::{LimboError, LimboResult};
use crate::write::{Value, Write, WriteType};

/// Magic bytes identifying a limbostore record: "LMBO" in ASCII
pub const MAGIC_ARRAY: [u8; 4] = [0x4C, 0x4D, 0x42, 0x4F]; // 'L','M','B','O'

/// Record header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Fixed payload prefix before the key bytes:
/// version(8) + record(8) + key_len(2) + value_len(4) + tag(1) + pad(1)
const PAYLOAD_PREFIX: usize = 24;

/// Maximum key size in bytes
pub const MAX_KEY_SIZE: usize = 256;

/// Maximum encoded value size in bytes (1MB)
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

const TAG_BOOLEAN: u8 = 1;
const TAG_INTEGER: u8 = 2;
const TAG_TEXT: u8 = 3;

/// Fixed-size header for each record.
///
/// Layout:
///   [0..4]   magic:      [u8;4] - "LMBO"
///   [4..8]   length:     u32 LE - payload length in bytes
///   [8..12]  checksum:   u32 LE - CRC32C of payload bytes
///   [12]     write_type: u8     - Add=1 or Remove=2
///   [13..16] reserved:   [u8;3] - must be zero
#[derive(Debug, Clone, Copy)]
struct RecordHeader {
    magic: [u8; 4],
    length: u32,
    checksum: u32,
    write_type: u8,
}

impl RecordHeader {
    fn new(length: u32, checksum: u32, write_type: WriteType) -> Self {
        Self {
            magic: MAGIC_ARRAY,
            length,
            checksum,
            write_type: write_type as u8,
        }
    }

    fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..8].copy_from_slice(&self.length.to_le_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        buf[12] = self.write_type;
        // bytes 13..16 are reserved, already zero
        buf
    }

    fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Self {
            magic,
            length: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            checksum: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            write_type: bytes[12],
        }
    }
}

fn encode_value(value: &Value) -> (u8, Vec<u8>) {
    match value {
        Value::Boolean(b) => (TAG_BOOLEAN, vec![u8::from(*b)]),
        Value::Integer(i) => (TAG_INTEGER, i.to_le_bytes().to_vec()),
        Value::Text(s) => (TAG_TEXT, s.as_bytes().to_vec()),
    }
}

fn decode_value(tag: u8, bytes: &[u8], offset: u64) -> LimboResult<Value> {
    match tag {
        TAG_BOOLEAN => match bytes {
            [0] => Ok(Value::Boolean(false)),
            [1] => Ok(Value::Boolean(true)),
            _ => Err(LimboError::Corrupt {
                offset,
                reason: format!("boolean value has {} bytes", bytes.len()),
            }),
        },
        TAG_INTEGER => {
            let arr: [u8; 8] = bytes.try_into().map_err(|_| LimboError::Corrupt {
                offset,
                reason: format!("integer value has {} bytes, need 8", bytes.len()),
            })?;
            Ok(Value::Integer(i64::from_le_bytes(arr)))
        }
        TAG_TEXT => {
            let text = std::str::from_utf8(bytes).map_err(|e| LimboError::Corrupt {
                offset,
                reason: format!("text value is not valid UTF-8: {}", e),
            })?;
            Ok(Value::Text(text.to_string()))
        }
        other => Err(LimboError::Corrupt {
            offset,
            reason: format!("unknown value tag: {}", other),
        }),
    }
}

/// Serialize a Write into a complete record: header + payload.
///
/// Validates size limits before allocating anything.
pub fn serialize_write(write: &Write) -> LimboResult<Vec<u8>> {
    let key = write.key().as_bytes();
    if key.len() > MAX_KEY_SIZE {
        return Err(LimboError::OversizedWrite {
            component: "key",
            size: key.len() as u64,
            limit: MAX_KEY_SIZE as u64,
        });
    }

    let (tag, value_bytes) = encode_value(write.value());
    if value_bytes.len() > MAX_VALUE_SIZE {
        return Err(LimboError::OversizedWrite {
            component: "value",
            size: value_bytes.len() as u64,
            limit: MAX_VALUE_SIZE as u64,
        });
    }

    let payload_size = PAYLOAD_PREFIX + key.len() + value_bytes.len();
    let mut payload = Vec::with_capacity(payload_size);
    payload.extend_from_slice(&write.version().to_le_bytes());
    payload.extend_from_slice(&write.record().to_le_bytes());
    payload.extend_from_slice(&(key.len() as u16).to_le_bytes());
    payload.extend_from_slice(&(value_bytes.len() as u32).to_le_bytes());
    payload.push(tag);
    payload.push(0); // padding byte
    payload.extend_from_slice(key);
    payload.extend_from_slice(&value_bytes);

    let checksum = crc32c::crc32c(&payload);
    let header = RecordHeader::new(payload.len() as u32, checksum, write.write_type());

    let mut buffer = Vec::with_capacity(HEADER_SIZE + payload_size);
    buffer.extend_from_slice(&header.to_bytes());
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

/// Deserialize one Write from the front of `data`.
///
/// `offset` is the position of `data[0]` within the backing file, used
/// only for error context. On success returns the Write and the total
/// record size consumed, so callers can advance through a flat log.
///
/// A truncated record reports [`LimboError::TornWrite`] — the expected
/// end-of-log of a page whose process crashed mid-append — which scanners
/// treat differently from checksum or structural corruption.
pub fn deserialize_write(data: &[u8], offset: u64) -> LimboResult<(Write, usize)> {
    if data.len() < HEADER_SIZE {
        return Err(LimboError::TornWrite {
            offset,
            needed: HEADER_SIZE as u64,
            available: data.len() as u64,
        });
    }

    let header_bytes: [u8; HEADER_SIZE] = data[..HEADER_SIZE]
        .try_into()
        .map_err(|_| LimboError::Corrupt {
            offset,
            reason: "header slice conversion failed".to_string(),
        })?;
    let header = RecordHeader::from_bytes(&header_bytes);

    if header.magic != MAGIC_ARRAY {
        return Err(LimboError::BadMagic {
            offset,
            found: header.magic,
        });
    }

    let total = HEADER_SIZE + header.length as usize;
    if data.len() < total {
        return Err(LimboError::TornWrite {
            offset,
            needed: total as u64,
            available: data.len() as u64,
        });
    }

    let payload = &data[HEADER_SIZE..total];
    let computed = crc32c::crc32c(payload);
    if computed != header.checksum {
        return Err(LimboError::ChecksumMismatch {
            offset,
            expected: header.checksum,
            actual: computed,
        });
    }

    let write_type = match header.write_type {
        1 => WriteType::Add,
        2 => WriteType::Remove,
        other => {
            return Err(LimboError::Corrupt {
                offset,
                reason: format!("invalid write type: {}", other),
            })
        }
    };

    if payload.len() < PAYLOAD_PREFIX {
        return Err(LimboError::Corrupt {
            offset,
            reason: format!("payload too short: {} bytes", payload.len()),
        });
    }

    let version = u64::from_le_bytes([
        payload[0], payload[1], payload[2], payload[3],
        payload[4], payload[5], payload[6], payload[7],
    ]);
    let record = u64::from_le_bytes([
        payload[8], payload[9], payload[10], payload[11],
        payload[12], payload[13], payload[14], payload[15],
    ]);
    let key_len = u16::from_le_bytes([payload[16], payload[17]]) as usize;
    let value_len = u32::from_le_bytes([payload[18], payload[19], payload[20], payload[21]]) as usize;
    let tag = payload[22];

    if PAYLOAD_PREFIX + key_len + value_len != payload.len() {
        return Err(LimboError::Corrupt {
            offset,
            reason: format!(
                "payload length {} does not match key({}) + value({})",
                payload.len(), key_len, value_len
            ),
        });
    }

    let key_end = PAYLOAD_PREFIX + key_len;
    let key = std::str::from_utf8(&payload[PAYLOAD_PREFIX..key_end])
        .map_err(|e| LimboError::Corrupt {
            offset,
            reason: format!("key is not valid UTF-8: {}", e),
        })?
        .to_string();
    let value = decode_value(tag, &payload[key_end..key_end + value_len], offset)?;

    Ok((
        Write::from_parts(version, write_type, key, value, record),
        total,
    ))
}

/// Scan a flat page log front to back, returning every complete,
/// well-formed Write in order.
///
/// Stops at the first torn record — the expected end-of-log of a file
/// whose process crashed mid-append — and likewise at the first corrupt
/// record, since skipping forward would punch a hole in the version
/// order. Both cases are logged with the offset; `path` is context only.
pub(crate) fn scan_log(data: &[u8], path: &std::path::Path) -> Vec<Write> {
    let mut writes = Vec::new();
    let mut offset = 0usize;
    while offset < data.len() {
        match deserialize_write(&data[offset..], offset as u64) {
            Ok((write, consumed)) => {
                writes.push(write);
                offset += consumed;
            }
            Err(LimboError::TornWrite { .. }) => {
                tracing::warn!(
                    path = %path.display(),
                    offset,
                    "log ends in a torn write, keeping records before it"
                );
                break;
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    offset,
                    %err,
                    "corrupt record in log, stopping scan"
                );
                break;
            }
        }
    }
    writes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let write = Write::add("name", Value::from("ada lovelace"), 17);

        let serialized = serialize_write(&write).unwrap();
        let (deserialized, consumed) = deserialize_write(&serialized, 0).unwrap();

        assert_eq!(deserialized, write);
        assert_eq!(consumed, serialized.len());
    }

    #[test]
    fn test_remove_roundtrip() {
        let write = Write::remove("age", Value::Integer(-5), 3);
        let serialized = serialize_write(&write).unwrap();
        let (deserialized, _) = deserialize_write(&serialized, 0).unwrap();
        assert_eq!(deserialized.write_type(), WriteType::Remove);
        assert_eq!(deserialized, write);
    }

    #[test]
    fn test_boolean_roundtrip() {
        let write = Write::add("active", Value::Boolean(true), 9);
        let serialized = serialize_write(&write).unwrap();
        let (deserialized, _) = deserialize_write(&serialized, 0).unwrap();
        assert_eq!(deserialized.value(), &Value::Boolean(true));
    }

    #[test]
    fn test_consecutive_records_parse_in_order() {
        let a = Write::add("k", Value::Integer(1), 1);
        let b = Write::remove("k", Value::Integer(1), 1);
        let mut log = serialize_write(&a).unwrap();
        log.extend_from_slice(&serialize_write(&b).unwrap());

        let (first, n) = deserialize_write(&log, 0).unwrap();
        let (second, _) = deserialize_write(&log[n..], n as u64).unwrap();
        assert_eq!(first, a);
        assert_eq!(second, b);
    }

    #[test]
    fn test_oversized_key_rejected() {
        let key = "x".repeat(MAX_KEY_SIZE + 1);
        let write = Write::add(&key, Value::Boolean(true), 1);
        let result = serialize_write(&write);
        assert!(matches!(
            result,
            Err(LimboError::OversizedWrite { component: "key", .. })
        ));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let text = "v".repeat(MAX_VALUE_SIZE + 1);
        let write = Write::add("k", Value::Text(text), 1);
        let result = serialize_write(&write);
        assert!(matches!(
            result,
            Err(LimboError::OversizedWrite { component: "value", .. })
        ));
    }

    #[test]
    fn test_corrupted_magic_detected() {
        let mut data = serialize_write(&Write::add("k", Value::Integer(1), 1)).unwrap();
        data[0] = 0xFF;
        assert!(matches!(
            deserialize_write(&data, 0),
            Err(LimboError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let mut data = serialize_write(&Write::add("k", Value::from("value"), 1)).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(matches!(
            deserialize_write(&data, 0),
            Err(LimboError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_record_is_torn() {
        let data = serialize_write(&Write::add("k", Value::from("value"), 1)).unwrap();
        let cut = &data[..data.len() - 3];
        assert!(matches!(
            deserialize_write(cut, 0),
            Err(LimboError::TornWrite { .. })
        ));
        // Shorter than even a header
        assert!(matches!(
            deserialize_write(&data[..5], 0),
            Err(LimboError::TornWrite { .. })
        ));
    }

    #[test]
    fn test_max_key_size_accepted() {
        let key = "k".repeat(MAX_KEY_SIZE);
        let write = Write::add(&key, Value::Boolean(false), 1);
        assert!(serialize_write(&write).is_ok());
    }
}
