//! Snapshot Binary Codec
//!
//! Live entries and tombstones are written as a versioned, self-describing
//! binary stream. Every value is preceded by its one-byte type tag, so the
//! decoder is a plain `match` on the tag: no type registry is involved.
//!
//! ## File Format
//!
//! All integers are big-endian.
//!
//! ```text
//! header   : magic "TMKV" | version u8 | kind u8 | count u32
//! key      : len u32 | UTF-8 bytes
//! value    : tag u8 | payload
//! payload  : i8..u64, f32, f64 -> fixed width
//!            bool              -> u8 (0 or 1)
//!            string, bytes     -> len u32 | bytes
//!
//! time     : secs u64 | nanos u32       (since the Unix epoch)
//!
//! kind 'E' (entries)    record: key | value | expiry
//! kind 'T' (tombstones) record: key | value | flags u8 | deleted_at time
//! expiry   : 0u8 (never) | 1u8 time
//! ```
//!
//! Tombstone flags: bit 0 = auto-cleaned, bit 1 = was expired.
//!
//! Version 1 stored times as a single u64 of nanoseconds, which runs out in
//! the year 2554. It is no longer read.
//!
//! ## Example
//!
//! ```
//! use tempokv::snapshot::codec::{decode_entries, encode_entries};
//! use tempokv::{Entry, Value};
//! use std::collections::HashMap;
//!
//! let mut entries = HashMap::new();
//! entries.insert("a".to_string(), Entry::new(Value::I32(1), None));
//!
//! let bytes = encode_entries(&entries).unwrap();
//! assert_eq!(decode_entries(&bytes).unwrap(), entries);
//! ```

use crate::storage::entry::{Entry, Tombstone};
use crate::storage::value::{tag, Value};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Leading bytes of every snapshot file
pub const MAGIC: &[u8; 4] = b"TMKV";

/// Current format version
pub const VERSION: u8 = 2;

/// Record kinds
pub mod kind {
    pub const ENTRIES: u8 = b'E';
    pub const TOMBSTONES: u8 = b'T';
}

const FLAG_AUTO_CLEANED: u8 = 0b01;
const FLAG_WAS_EXPIRED: u8 = 0b10;

const EXPIRY_NEVER: u8 = 0;
const EXPIRY_AT: u8 = 1;

/// Size of magic + version + kind + count
const HEADER_LEN: usize = MAGIC.len() + 1 + 1 + 4;

/// Errors that can occur while encoding a snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A length does not fit the format's u32 length fields
    #[error("{what} too large: {len} bytes (max: {max})", max = u32::MAX)]
    TooLarge { what: &'static str, len: usize },
}

/// Errors that can occur while decoding a snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The input does not start with the snapshot magic
    #[error("not a snapshot file (bad magic)")]
    BadMagic,

    /// The format version is not understood by this build
    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),

    /// The file holds a different record kind than requested
    #[error("wrong snapshot kind: expected {expected:?}, found {found:?}")]
    WrongKind { expected: char, found: char },

    /// The input ended in the middle of a field
    #[error("truncated snapshot: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// Unknown value type tag
    #[error("unknown type tag: {0:#04x}")]
    UnknownTag(u8),

    /// A key or string value is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// A bool or flags byte holds undefined bits
    #[error("invalid {what} byte: {byte:#04x}")]
    InvalidByte { what: &'static str, byte: u8 },

    /// A timestamp does not fit `SystemTime` or has out-of-range nanoseconds
    #[error("invalid timestamp: {secs}s + {nanos}ns")]
    InvalidTimestamp { secs: u64, nanos: u32 },

    /// Bytes left over after the last record
    #[error("{0} trailing bytes after last record")]
    TrailingBytes(usize),
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// A record shape that can be stored in a snapshot file.
trait Record: Sized {
    const KIND: u8;

    fn value(&self) -> &Value;

    fn encode_trailer(&self, buf: &mut BytesMut);

    fn decode(value: Value, reader: &mut Reader<'_>) -> DecodeResult<Self>;
}

impl Record for Entry {
    const KIND: u8 = kind::ENTRIES;

    fn value(&self) -> &Value {
        &self.value
    }

    fn encode_trailer(&self, buf: &mut BytesMut) {
        match self.expires_at {
            None => buf.put_u8(EXPIRY_NEVER),
            Some(at) => {
                buf.put_u8(EXPIRY_AT);
                put_time(buf, at);
            }
        }
    }

    fn decode(value: Value, reader: &mut Reader<'_>) -> DecodeResult<Self> {
        let expires_at = match reader.u8()? {
            EXPIRY_NEVER => None,
            EXPIRY_AT => Some(reader.time()?),
            byte => {
                return Err(DecodeError::InvalidByte {
                    what: "expiry marker",
                    byte,
                })
            }
        };
        Ok(Entry { value, expires_at })
    }
}

impl Record for Tombstone {
    const KIND: u8 = kind::TOMBSTONES;

    fn value(&self) -> &Value {
        &self.value
    }

    fn encode_trailer(&self, buf: &mut BytesMut) {
        let mut flags = 0;
        if self.auto_cleaned {
            flags |= FLAG_AUTO_CLEANED;
        }
        if self.was_expired {
            flags |= FLAG_WAS_EXPIRED;
        }
        buf.put_u8(flags);
        put_time(buf, self.deleted_at);
    }

    fn decode(value: Value, reader: &mut Reader<'_>) -> DecodeResult<Self> {
        let flags = reader.u8()?;
        if flags & !(FLAG_AUTO_CLEANED | FLAG_WAS_EXPIRED) != 0 {
            return Err(DecodeError::InvalidByte {
                what: "tombstone flags",
                byte: flags,
            });
        }
        let deleted_at = reader.time()?;
        Ok(Tombstone {
            value,
            auto_cleaned: flags & FLAG_AUTO_CLEANED != 0,
            was_expired: flags & FLAG_WAS_EXPIRED != 0,
            deleted_at,
        })
    }
}

/// Encodes a live-entry map.
pub fn encode_entries(entries: &HashMap<String, Entry>) -> Result<Bytes, EncodeError> {
    encode_map(entries)
}

/// Encodes a tombstone map.
pub fn encode_tombstones(tombstones: &HashMap<String, Tombstone>) -> Result<Bytes, EncodeError> {
    encode_map(tombstones)
}

/// Decodes a live-entry map.
pub fn decode_entries(buf: &[u8]) -> DecodeResult<HashMap<String, Entry>> {
    decode_map(buf)
}

/// Decodes a tombstone map.
pub fn decode_tombstones(buf: &[u8]) -> DecodeResult<HashMap<String, Tombstone>> {
    decode_map(buf)
}

fn encode_map<R: Record>(map: &HashMap<String, R>) -> Result<Bytes, EncodeError> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + map.len() * 32);

    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);
    buf.put_u8(R::KIND);
    buf.put_u32(checked_len("record count", map.len())?);

    for (key, record) in map {
        put_bytes(&mut buf, "key", key.as_bytes())?;
        put_value(&mut buf, record.value())?;
        record.encode_trailer(&mut buf);
    }

    Ok(buf.freeze())
}

fn decode_map<R: Record>(buf: &[u8]) -> DecodeResult<HashMap<String, R>> {
    let mut reader = Reader::new(buf);

    if reader.take(MAGIC.len())? != MAGIC {
        return Err(DecodeError::BadMagic);
    }

    let version = reader.u8()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let found = reader.u8()?;
    if found != R::KIND {
        return Err(DecodeError::WrongKind {
            expected: char::from(R::KIND),
            found: char::from(found),
        });
    }

    let count = reader.u32()? as usize;
    // Each record needs at least a key length, a tag, a payload byte and a trailer byte
    let mut map = HashMap::with_capacity(count.min(reader.remaining() / 7));

    for _ in 0..count {
        let key = reader.string()?;
        let value = reader.value()?;
        let record = R::decode(value, &mut reader)?;
        map.insert(key, record);
    }

    if reader.remaining() > 0 {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }

    Ok(map)
}

fn checked_len(what: &'static str, len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::TooLarge { what, len })
}

fn put_bytes(buf: &mut BytesMut, what: &'static str, data: &[u8]) -> Result<(), EncodeError> {
    buf.put_u32(checked_len(what, data.len())?);
    buf.put_slice(data);
    Ok(())
}

fn put_value(buf: &mut BytesMut, value: &Value) -> Result<(), EncodeError> {
    buf.put_u8(value.tag());
    match value {
        Value::I8(n) => buf.put_i8(*n),
        Value::I16(n) => buf.put_i16(*n),
        Value::I32(n) => buf.put_i32(*n),
        Value::I64(n) => buf.put_i64(*n),
        Value::U8(n) => buf.put_u8(*n),
        Value::U16(n) => buf.put_u16(*n),
        Value::U32(n) => buf.put_u32(*n),
        Value::U64(n) => buf.put_u64(*n),
        Value::F32(n) => buf.put_f32(*n),
        Value::F64(n) => buf.put_f64(*n),
        Value::Bool(b) => buf.put_u8(u8::from(*b)),
        Value::Str(s) => put_bytes(buf, "string value", s.as_bytes())?,
        Value::Bytes(b) => put_bytes(buf, "bytes value", b)?,
    }
    Ok(())
}

// Instants before the epoch are written as the epoch itself.
fn put_time(buf: &mut BytesMut, t: SystemTime) {
    let since_epoch = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    buf.put_u64(since_epoch.as_secs());
    buf.put_u32(since_epoch.subsec_nanos());
}

/// Bounds-checked cursor over a snapshot buffer.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> DecodeResult<()> {
        if self.remaining() < needed {
            return Err(DecodeError::Truncated {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> DecodeResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self) -> DecodeResult<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    fn u64(&mut self) -> DecodeResult<u64> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    fn time(&mut self) -> DecodeResult<SystemTime> {
        let secs = self.u64()?;
        let nanos = self.u32()?;
        if nanos >= 1_000_000_000 {
            return Err(DecodeError::InvalidTimestamp { secs, nanos });
        }
        UNIX_EPOCH
            .checked_add(Duration::new(secs, nanos))
            .ok_or(DecodeError::InvalidTimestamp { secs, nanos })
    }

    fn length_prefixed(&mut self) -> DecodeResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn string(&mut self) -> DecodeResult<String> {
        let raw = self.length_prefixed()?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|e| DecodeError::InvalidUtf8(e.to_string()))
    }

    fn value(&mut self) -> DecodeResult<Value> {
        let value = match self.u8()? {
            tag::I8 => {
                self.ensure(1)?;
                Value::I8(self.buf.get_i8())
            }
            tag::I16 => {
                self.ensure(2)?;
                Value::I16(self.buf.get_i16())
            }
            tag::I32 => {
                self.ensure(4)?;
                Value::I32(self.buf.get_i32())
            }
            tag::I64 => {
                self.ensure(8)?;
                Value::I64(self.buf.get_i64())
            }
            tag::U8 => Value::U8(self.u8()?),
            tag::U16 => {
                self.ensure(2)?;
                Value::U16(self.buf.get_u16())
            }
            tag::U32 => Value::U32(self.u32()?),
            tag::U64 => Value::U64(self.u64()?),
            tag::F32 => {
                self.ensure(4)?;
                Value::F32(self.buf.get_f32())
            }
            tag::F64 => {
                self.ensure(8)?;
                Value::F64(self.buf.get_f64())
            }
            tag::BOOL => match self.u8()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                byte => return Err(DecodeError::InvalidByte { what: "bool", byte }),
            },
            tag::STRING => Value::Str(self.string()?),
            tag::BYTES => Value::Bytes(Bytes::copy_from_slice(self.length_prefixed()?)),
            unknown => return Err(DecodeError::UnknownTag(unknown)),
        };
        Ok(value)
    }
}
