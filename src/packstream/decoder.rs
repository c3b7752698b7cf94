//! PackStream decoder.
//!
//! A cursor over a byte slice: every call consumes exactly one value and
//! advances the position, so structures recurse with the same cursor
//! instead of splitting buffers.

use bytes::Buf;

use crate::version::BoltVersion;

use super::marker::{self, sig};
use super::structures::{
    Date, Duration, LocalDateTime, LocalTime, Node, OffsetDateTime, OffsetTime, Path, Point2D,
    Point3D, Relationship, UnboundRelationship, ZonedDateTime,
};
use super::types::{Value, ValueMap};
use super::DecodeError;

/// PackStream decoder reading values from a byte slice.
pub struct PackStreamDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    version: BoltVersion,
}

impl<'a> PackStreamDecoder<'a> {
    /// Create a new decoder over the given bytes.
    pub fn new(data: &'a [u8], version: BoltVersion) -> Self {
        Self {
            data,
            pos: 0,
            version,
        }
    }

    /// The protocol version this decoder assumes.
    pub fn version(&self) -> BoltVersion {
        self.version
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to consume.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Decode the next value.
    ///
    /// Structures with a known domain signature are assembled into their
    /// typed variants; any other signature is a decode error at this layer.
    pub fn decode(&mut self) -> Result<Value, DecodeError> {
        let marker = self.read_u8()?;

        match marker {
            0x00..=0x7F | 0xF0..=0xFF => Ok(Value::Int(i64::from(marker as i8))),

            0x80..=0x8F => self.read_string((marker - marker::TINY_STRING_BASE) as usize),
            0x90..=0x9F => self.read_list((marker - marker::TINY_LIST_BASE) as usize),
            0xA0..=0xAF => self.read_map((marker - marker::TINY_MAP_BASE) as usize),
            0xB0..=0xBF => self.read_struct((marker - marker::TINY_STRUCT_BASE) as usize),

            marker::NULL => Ok(Value::Null),
            marker::TRUE => Ok(Value::Bool(true)),
            marker::FALSE => Ok(Value::Bool(false)),
            marker::FLOAT_64 => Ok(Value::Float(self.read_f64()?)),

            marker::INT_8 => Ok(Value::Int(i64::from(self.read_i8()?))),
            marker::INT_16 => Ok(Value::Int(i64::from(self.read_i16()?))),
            marker::INT_32 => Ok(Value::Int(i64::from(self.read_i32()?))),
            marker::INT_64 => Ok(Value::Int(self.read_i64()?)),

            marker::STRING_8 => {
                let len = self.read_u8()? as usize;
                self.read_string(len)
            }
            marker::STRING_16 => {
                let len = self.read_u16()? as usize;
                self.read_string(len)
            }
            marker::STRING_32 => {
                let len = self.read_u32()? as usize;
                self.read_string(len)
            }

            marker::LIST_8 => {
                let len = self.read_u8()? as usize;
                self.read_list(len)
            }
            marker::LIST_16 => {
                let len = self.read_u16()? as usize;
                self.read_list(len)
            }
            marker::LIST_32 => {
                let len = self.read_u32()? as usize;
                self.read_list(len)
            }

            marker::MAP_8 => {
                let len = self.read_u8()? as usize;
                self.read_map(len)
            }
            marker::MAP_16 => {
                let len = self.read_u16()? as usize;
                self.read_map(len)
            }
            marker::MAP_32 => {
                let len = self.read_u32()? as usize;
                self.read_map(len)
            }

            marker::STRUCT_8 => {
                let len = self.read_u8()? as usize;
                self.read_struct(len)
            }
            marker::STRUCT_16 => {
                let len = self.read_u16()? as usize;
                self.read_struct(len)
            }

            other => Err(DecodeError::UnknownMarker(other)),
        }
    }

    /// Read a structure marker and return `(signature, field_count)`.
    ///
    /// Used by the message layer, which interprets the signature as a
    /// message tag and then decodes the fields one by one.
    pub fn read_struct_header(&mut self) -> Result<(u8, usize), DecodeError> {
        let m = self.read_u8()?;
        let field_count = match m {
            0xB0..=0xBF => (m - marker::TINY_STRUCT_BASE) as usize,
            marker::STRUCT_8 => self.read_u8()? as usize,
            marker::STRUCT_16 => self.read_u16()? as usize,
            other => {
                return Err(DecodeError::InvalidStructure(format!(
                    "expected a structure, got marker 0x{:02X}",
                    other
                )))
            }
        };
        let signature = self.read_u8()?;
        Ok((signature, field_count))
    }

    fn read_string(&mut self, len: usize) -> Result<Value, DecodeError> {
        let bytes = self.read_bytes(len)?;
        let s = std::str::from_utf8(bytes).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))?;
        Ok(Value::String(s.to_string()))
    }

    fn read_list(&mut self, len: usize) -> Result<Value, DecodeError> {
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(Value::List(items))
    }

    fn read_map(&mut self, len: usize) -> Result<Value, DecodeError> {
        let mut map = ValueMap::with_capacity(len.min(1024));
        for _ in 0..len {
            let key = match self.decode()? {
                Value::String(s) => s,
                _ => return Err(DecodeError::InvalidMapKey),
            };
            let value = self.decode()?;
            // duplicate keys: last occurrence wins
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    fn read_struct(&mut self, field_count: usize) -> Result<Value, DecodeError> {
        let signature = self.read_u8()?;
        let mut fields = Vec::with_capacity(field_count.min(64));
        for _ in 0..field_count {
            fields.push(self.decode()?);
        }
        self.assemble(signature, fields)
    }

    fn assemble(&self, signature: u8, fields: Vec<Value>) -> Result<Value, DecodeError> {
        match signature {
            sig::NODE => Node::from_fields(fields).map(Value::Node),
            sig::RELATIONSHIP => Relationship::from_fields(fields).map(Value::Relationship),
            sig::UNBOUND_RELATIONSHIP => {
                UnboundRelationship::from_fields(fields).map(Value::UnboundRelationship)
            }
            sig::PATH => Path::from_fields(fields).map(Value::Path),

            sig::DATE
            | sig::TIME
            | sig::LOCAL_TIME
            | sig::DATE_TIME
            | sig::DATE_TIME_ZONE_ID
            | sig::LOCAL_DATE_TIME
            | sig::DURATION
                if !self.version.supports_temporal() =>
            {
                Err(DecodeError::UnknownSignature(signature))
            }
            sig::POINT_2D | sig::POINT_3D if !self.version.supports_spatial() => {
                Err(DecodeError::UnknownSignature(signature))
            }

            sig::DATE => Date::from_fields(fields).map(Value::Date),
            sig::TIME => OffsetTime::from_fields(fields).map(Value::Time),
            sig::LOCAL_TIME => LocalTime::from_fields(fields).map(Value::LocalTime),
            sig::DATE_TIME => OffsetDateTime::from_fields(fields).map(Value::DateTime),
            sig::DATE_TIME_ZONE_ID => ZonedDateTime::from_fields(fields).map(Value::DateTimeZoned),
            sig::LOCAL_DATE_TIME => LocalDateTime::from_fields(fields).map(Value::LocalDateTime),
            sig::DURATION => Duration::from_fields(fields).map(Value::Duration),
            sig::POINT_2D => Point2D::from_fields(fields).map(Value::Point2D),
            sig::POINT_3D => Point3D::from_fields(fields).map(Value::Point3D),

            other => Err(DecodeError::UnknownSignature(other)),
        }
    }

    // Low-level reads

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        if self.remaining() < 1 {
            return Err(DecodeError::UnexpectedEof);
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        if self.remaining() < 2 {
            return Err(DecodeError::UnexpectedEof);
        }
        let value = (&self.data[self.pos..]).get_u16();
        self.pos += 2;
        Ok(value)
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(self.read_u16()? as i16)
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        if self.remaining() < 4 {
            return Err(DecodeError::UnexpectedEof);
        }
        let value = (&self.data[self.pos..]).get_u32();
        self.pos += 4;
        Ok(value)
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(self.read_u32()? as i32)
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        if self.remaining() < 8 {
            return Err(DecodeError::UnexpectedEof);
        }
        let value = (&self.data[self.pos..]).get_i64();
        self.pos += 8;
        Ok(value)
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        if self.remaining() < 8 {
            return Err(DecodeError::UnexpectedEof);
        }
        let value = (&self.data[self.pos..]).get_f64();
        self.pos += 8;
        Ok(value)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

/// Decode a single value, returning it together with the number of bytes
/// consumed.
pub fn decode(data: &[u8], version: BoltVersion) -> Result<(Value, usize), DecodeError> {
    let mut decoder = PackStreamDecoder::new(data, version);
    let value = decoder.decode()?;
    Ok((value, decoder.position()))
}
